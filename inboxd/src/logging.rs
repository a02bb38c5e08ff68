pub fn init() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "inboxd=info,inboxd_collections=info,inboxd_notify=info");
    }
    tracing_subscriber::fmt::init();
}
