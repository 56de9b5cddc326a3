const APP_NAME: &str = "uilabel";

pub fn send(body: impl Into<String>) {
    send_with_summary(APP_NAME, body);
}

pub fn send_with_summary(summary: &str, body: impl Into<String>) {
    let body = body.into();
    if let Err(err) = notify_rust::Notification::new()
        .appname(APP_NAME)
        .summary(summary)
        .body(&body)
        .show()
    {
        tracing::warn!("system notification failed: {err}");
    }
}
