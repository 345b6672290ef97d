//! Per-publisher extraction rules.
//!
//! Most Korean outlets put the article body in a container the generic
//! selector cascade already knows. The hosts below either use a container
//! name nobody else uses, or ship the body as JSON-LD on a page whose markup
//! is rendered client-side.

/// How to pull the body out of a known publisher's page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteRule {
    /// Try these selectors, in order.
    Selectors(&'static [&'static str]),
    /// Read `articleBody` from `<script type="application/ld+json">`.
    JsonLd,
}

/// Ordered most-specific first: lookup takes the first matching entry.
const SITES: &[(&str, SiteRule)] = &[
    ("sports.news.naver.com", SiteRule::Selectors(&["#newsEndContents"])),
    ("entertain.naver.com", SiteRule::Selectors(&["#articeBody", "#dic_area"])),
    ("n.news.naver.com", SiteRule::Selectors(&["#dic_area", "#newsct_article"])),
    ("news.naver.com", SiteRule::Selectors(&["#dic_area", "#articleBodyContents"])),
    ("v.daum.net", SiteRule::Selectors(&[".article_view"])),
    ("chosun.com", SiteRule::JsonLd),
    ("biz.chosun.com", SiteRule::JsonLd),
    ("hankyung.com", SiteRule::Selectors(&["#articletxt"])),
    ("mk.co.kr", SiteRule::Selectors(&[".news_cnt_detail_wrap"])),
    ("yna.co.kr", SiteRule::Selectors(&[".story-news"])),
    ("joongang.co.kr", SiteRule::Selectors(&["#article_body"])),
    ("edaily.co.kr", SiteRule::Selectors(&[".news_body"])),
    ("mt.co.kr", SiteRule::Selectors(&["#textBody"])),
    ("sedaily.com", SiteRule::Selectors(&[".article_view"])),
    ("etnews.com", SiteRule::Selectors(&["#articleBody", ".article_txt"])),
];

/// Rule for `host`, matching the exact host or any subdomain of an entry.
pub fn rule_for_host(host: &str) -> Option<SiteRule> {
    let host = host.trim_start_matches("www.").to_ascii_lowercase();
    SITES
        .iter()
        .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{suffix}")))
        .map(|(_, rule)| *rule)
}
