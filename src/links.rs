/// Builds watch-online links for the external streaming hub.
#[derive(Debug, Clone)]
pub struct LinkFormatter {
    base: String,
}

impl LinkFormatter {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { base }
    }

    /// `<base>/?url=<percent-encoded direct_url>`
    pub fn build_watch_url(&self, direct_url: &str) -> String {
        format!("{}/?url={}", self.base, urlencoding::encode(direct_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn url_param(watch: &str) -> String {
        let parsed = Url::parse(watch).unwrap();
        parsed
            .query_pairs()
            .find(|(k, _)| k == "url")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn query_parameter_decodes_back_to_direct_link() {
        let f = LinkFormatter::new("https://streaminghub.42web.io");
        let watch = f.build_watch_url("https://cdn.example/a b.mp4");
        assert!(watch.starts_with("https://streaminghub.42web.io/?url="));
        assert_eq!(url_param(&watch), "https://cdn.example/a b.mp4");
    }

    #[test]
    fn reserved_characters_are_fully_encoded() {
        let f = LinkFormatter::new("https://hub.example/");
        let watch = f.build_watch_url("https://cdn.example/f.mkv?token=a&b=c#x");
        assert_eq!(
            watch,
            "https://hub.example/?url=https%3A%2F%2Fcdn.example%2Ff.mkv%3Ftoken%3Da%26b%3Dc%23x"
        );
        assert_eq!(url_param(&watch), "https://cdn.example/f.mkv?token=a&b=c#x");
    }

    #[test]
    fn non_ascii_round_trips() {
        let f = LinkFormatter::new("https://hub.example");
        let direct = "https://cdn.example/фильм 1080p.mp4";
        assert_eq!(url_param(&f.build_watch_url(direct)), direct);
    }
}
