diesel::table! {
    store_entries (key) {
        key -> Text,
        value -> Text,
    }
}
