/// Seconds the processing page stays up before redirecting.
pub const REDIRECT_DELAY_SECS: u32 = 3;

/// Page shown when the gateway posts the browser back after payment.
pub fn render_verify_page(redirect_to: &str) -> String {
    // JSON string literals are valid JavaScript string literals.
    let target = serde_json::to_string(redirect_to).unwrap_or_else(|_| "\"/\"".to_string());
    let delay_ms = REDIRECT_DELAY_SECS * 1000;

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Processing payment</title>
  <style>
    body {{ font-family: sans-serif; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; }}
    .card {{ text-align: center; }}
  </style>
</head>
<body>
  <div class="card">
    <h1>Processing your payment</h1>
    <p>Please do not close this window. You will be redirected shortly.</p>
  </div>
  <script>
    setTimeout(function () {{ window.location.href = {target}; }}, {delay_ms});
  </script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_redirects_to_target() {
        let page = render_verify_page("https://example.com/payment-status");
        assert!(page.contains(r#"window.location.href = "https://example.com/payment-status";"#));
        assert!(page.contains("3000"));
    }

    #[test]
    fn test_target_is_quoted() {
        let page = render_verify_page(r#"https://example.com/"x"#);
        assert!(page.contains(r#""https://example.com/\"x""#));
    }
}
