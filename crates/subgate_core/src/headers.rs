/// Headers never replayed to the caller. The payload is served out of band
/// from the original transport negotiation, so transport-security,
/// content-coding and caching-variance assertions from the upstream would
/// mislead the client; the framing headers are always rewritten by the
/// relay itself.
const DENYLIST: [&str; 6] = [
    "strict-transport-security",
    "content-encoding",
    "vary",
    "content-length",
    "transfer-encoding",
    "connection",
];

/// Drop denylisted headers, preserving the order of everything else.
pub(crate) fn filter_response_headers(headers: Vec<(String, String)>) -> Vec<(String, String)> {
    headers
        .into_iter()
        .filter(|(name, _)| !DENYLIST.iter().any(|deny| name.eq_ignore_ascii_case(deny)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::filter_response_headers;

    fn header(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn denylisted_headers_are_dropped_case_insensitively() {
        let filtered = filter_response_headers(vec![
            header("Content-Type", "text/yaml"),
            header("Strict-Transport-Security", "max-age=63072000"),
            header("content-encoding", "gzip"),
            header("VARY", "Accept-Encoding"),
            header("Content-Length", "120"),
            header("Transfer-Encoding", "chunked"),
            header("Connection", "keep-alive"),
            header("Subscription-Userinfo", "upload=0; download=0"),
        ]);

        assert_eq!(
            filtered,
            vec![
                header("Content-Type", "text/yaml"),
                header("Subscription-Userinfo", "upload=0; download=0"),
            ]
        );
    }

    #[test]
    fn unlisted_headers_pass_through_in_order() {
        let headers = vec![
            header("Content-Type", "text/yaml"),
            header("Content-Disposition", "attachment; filename=Clash_mix.yaml"),
            header("Profile-Update-Interval", "24"),
        ];
        assert_eq!(filter_response_headers(headers.clone()), headers);
    }
}
