//! Generated responses served when both cache and network fail.

use crate::http::Response;

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Offline - Business Card Generator</title>
    <style>
        body {
            font-family: 'Inter', sans-serif;
            background: linear-gradient(135deg, #1e3a8a, #3b82f6);
            color: white;
            margin: 0;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            text-align: center;
        }
        .offline-container {
            max-width: 400px;
            padding: 2rem;
            background: rgba(255, 255, 255, 0.1);
            border-radius: 16px;
            border: 1px solid rgba(255, 255, 255, 0.2);
        }
        .offline-title { font-size: 2rem; font-weight: 600; margin-bottom: 1rem; }
        .offline-message { font-size: 1.1rem; margin-bottom: 2rem; line-height: 1.6; }
        .features-list { text-align: left; margin: 1.5rem 0; }
        .retry-btn {
            background: #60a5fa;
            color: white;
            border: none;
            padding: 0.75rem 1.5rem;
            border-radius: 8px;
            font-size: 1rem;
            cursor: pointer;
        }
    </style>
</head>
<body>
    <div class="offline-container">
        <h1 class="offline-title">You're Offline</h1>
        <p class="offline-message">
            No internet connection detected. Some features may not be available, but you can still:
        </p>
        <ul class="features-list">
            <li>Browse previously visited pages</li>
            <li>View cached business card templates</li>
            <li>Access the creation form</li>
            <li>Preview saved designs</li>
        </ul>
        <button class="retry-btn" onclick="window.location.reload()">Try Again</button>
    </div>
</body>
</html>
"#;

const FALLBACK_IMAGE: &str = r##"<svg width="400" height="300" viewBox="0 0 400 300" fill="none" xmlns="http://www.w3.org/2000/svg">
  <rect width="400" height="300" fill="#1e3a8a"/>
  <rect x="50" y="100" width="300" height="100" rx="8" fill="rgba(255,255,255,0.1)" stroke="rgba(255,255,255,0.2)"/>
  <circle cx="200" cy="150" r="20" fill="rgba(255,255,255,0.3)"/>
  <text x="200" y="170" fill="rgba(255,255,255,0.7)" font-family="Arial" font-size="14" text-anchor="middle">Image unavailable</text>
  <text x="200" y="190" fill="rgba(255,255,255,0.5)" font-family="Arial" font-size="12" text-anchor="middle">Please check your connection</text>
</svg>
"##;

/// Page served to navigations that cannot reach the network or the cache.
pub fn offline_page() -> Response {
  Response::ok_with_type("text/html", OFFLINE_PAGE)
}

/// Placeholder served for images that cannot be loaded.
pub fn fallback_image() -> Response {
  Response::ok_with_type("image/svg+xml", FALLBACK_IMAGE)
}
