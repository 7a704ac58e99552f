//! User-agent → device descriptor classification.
//!
//! Coarse on purpose: the registry only needs kind/OS/browser buckets
//! for the statistics view and session labels, not full UA parsing.

use agw_domain::model::{DeviceDescriptor, DeviceKind};

const BOT_MARKERS: [&str; 6] = ["bot", "crawler", "spider", "curl", "wget", "python-requests"];

pub fn parse_user_agent(ua: &str) -> DeviceDescriptor {
    let ua_lower = ua.to_ascii_lowercase();
    if ua_lower.trim().is_empty() {
        return DeviceDescriptor::default();
    }

    let kind = if BOT_MARKERS.iter().any(|m| ua_lower.contains(m)) {
        DeviceKind::Bot
    } else if ua_lower.contains("ipad") || ua_lower.contains("tablet") {
        DeviceKind::Tablet
    } else if ua_lower.contains("mobile")
        || ua_lower.contains("iphone")
        || ua_lower.contains("android")
    {
        DeviceKind::Mobile
    } else if ua_lower.contains("windows")
        || ua_lower.contains("macintosh")
        || ua_lower.contains("x11")
        || ua_lower.contains("linux")
    {
        DeviceKind::Desktop
    } else {
        DeviceKind::Unknown
    };

    let os = if ua_lower.contains("windows") {
        "Windows"
    } else if ua_lower.contains("iphone") || ua_lower.contains("ipad") {
        "iOS"
    } else if ua_lower.contains("macintosh") || ua_lower.contains("mac os") {
        "macOS"
    } else if ua_lower.contains("android") {
        "Android"
    } else if ua_lower.contains("linux") {
        "Linux"
    } else {
        ""
    };

    // Order matters: Edge and Chrome both advertise "chrome", Chrome and
    // Safari both advertise "safari".
    let browser = if ua_lower.contains("edg/") || ua_lower.contains("edge") {
        "Edge"
    } else if ua_lower.contains("firefox") {
        "Firefox"
    } else if ua_lower.contains("chrome") || ua_lower.contains("chromium") {
        "Chrome"
    } else if ua_lower.contains("safari") {
        "Safari"
    } else if ua_lower.contains("curl") {
        "curl"
    } else {
        ""
    };

    DeviceDescriptor {
        kind,
        os: os.to_string(),
        browser: browser.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_chrome() {
        let d = parse_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
        );
        assert_eq!(d.kind, DeviceKind::Desktop);
        assert_eq!(d.os, "Windows");
        assert_eq!(d.browser, "Chrome");
    }

    #[test]
    fn iphone_safari() {
        let d = parse_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(d.kind, DeviceKind::Mobile);
        assert_eq!(d.os, "iOS");
        assert_eq!(d.browser, "Safari");
    }

    #[test]
    fn curl_is_a_bot() {
        let d = parse_user_agent("curl/8.4.0");
        assert_eq!(d.kind, DeviceKind::Bot);
        assert_eq!(d.browser, "curl");
    }

    #[test]
    fn empty_is_unknown() {
        let d = parse_user_agent("");
        assert_eq!(d.kind, DeviceKind::Unknown);
        assert!(d.os.is_empty());
    }
}
