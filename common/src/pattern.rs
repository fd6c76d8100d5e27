use anyhow::{Context, Result};
use regex::Regex;

/// A set of entry name patterns compiled into one matcher.
///
/// Every pattern is literal text except `*`, which matches any run of
/// characters including `/`. A path matches when it starts with something
/// one of the patterns describes, so `com/example/Foo` also covers
/// `com/example/Foo$Inner.class`.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    regex: Option<Regex>,
}

impl PatternSet {
    pub fn compile<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_owned())
            .collect();

        if patterns.is_empty() {
            return Ok(Self {
                patterns,
                regex: None,
            });
        }

        let alternatives: Vec<String> = patterns
            .iter()
            .map(|p| format!("(?:{})", to_regex(p)))
            .collect();
        let source = format!("^(?s:{})", alternatives.join("|"));
        let regex = Regex::new(&source)
            .with_context(|| format!("unable to compile patterns {patterns:?}"))?;

        Ok(Self {
            patterns,
            regex: Some(regex),
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(path))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn to_regex(pattern: &str) -> String {
    pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}
