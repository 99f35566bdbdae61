pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> String;
    fn access_token(&self) -> String;
    /// SQLite database backing the booking store. Bookings are kept in memory if absent.
    fn database_url(&self) -> Option<String>;
    fn email_api_key(&self) -> Option<String>;
    fn email_api_url(&self) -> String;
    fn email_sender(&self) -> String;
    fn operator_email(&self) -> String;
}
