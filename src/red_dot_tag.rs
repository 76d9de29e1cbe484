use std::fmt;

use serde::{Deserialize, Serialize};

use crate::red_dot_error::{RedDotError, RedDotResult};

/// Dotted hierarchical identifier, e.g. `"Mail.System"`.
///
/// A tag's direct parent drops its last segment. Top-level tags have no
/// parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RedDotTag(String);

impl RedDotTag {
    pub fn new(tag: impl AsRef<str>) -> RedDotResult<Self> {
        let tag = tag.as_ref();
        validate(tag)?;
        Ok(Self(tag.to_string()))
    }

    /// Joins the trimmed, non-empty parts with dots.
    pub fn from_parts<I, S>(parts: I) -> RedDotResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .filter_map(|part| {
                let part = part.as_ref().trim();
                (!part.is_empty()).then(|| part.to_string())
            })
            .collect::<Vec<_>>()
            .join(".");
        Self::new(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    pub fn last_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    pub fn direct_parent(&self) -> Option<RedDotTag> {
        self.0
            .rfind('.')
            .map(|split| RedDotTag(self.0[..split].to_string()))
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = RedDotTag> {
        std::iter::successors(self.direct_parent(), RedDotTag::direct_parent)
    }

    /// Whether `self` sits strictly below `other` on segment boundaries.
    pub fn is_descendant_of(&self, other: &RedDotTag) -> bool {
        self.0.len() > other.0.len()
            && self.0.starts_with(&other.0)
            && self.0.as_bytes()[other.0.len()] == b'.'
    }

    pub fn is_ancestor_of(&self, other: &RedDotTag) -> bool {
        other.is_descendant_of(self)
    }
}

fn validate(tag: &str) -> RedDotResult<()> {
    let invalid = |reason| {
        Err(RedDotError::InvalidTag {
            tag: tag.to_string(),
            reason,
        })
    };
    if tag.is_empty() {
        return invalid("tag is empty");
    }
    if tag.chars().any(char::is_whitespace) {
        return invalid("tag contains whitespace");
    }
    if tag.split('.').any(str::is_empty) {
        return invalid("tag has an empty segment");
    }
    Ok(())
}

impl fmt::Display for RedDotTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RedDotTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RedDotTag {
    type Error = RedDotError;

    fn try_from(value: String) -> RedDotResult<Self> {
        validate(&value)?;
        Ok(Self(value))
    }
}

impl TryFrom<&str> for RedDotTag {
    type Error = RedDotError;

    fn try_from(value: &str) -> RedDotResult<Self> {
        Self::new(value)
    }
}

impl From<RedDotTag> for String {
    fn from(tag: RedDotTag) -> Self {
        tag.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> RedDotTag {
        RedDotTag::new(s).unwrap()
    }

    #[test]
    fn parent_and_ancestors() {
        let leaf = tag("Mail.System.Reward");
        assert_eq!(leaf.direct_parent(), Some(tag("Mail.System")));
        assert_eq!(
            leaf.ancestors().collect::<Vec<_>>(),
            vec![tag("Mail.System"), tag("Mail")]
        );
        assert_eq!(tag("Mail").direct_parent(), None);
        assert_eq!(leaf.depth(), 3);
        assert_eq!(leaf.last_segment(), "Reward");
    }

    #[test]
    fn descendants_respect_segment_boundaries() {
        assert!(tag("Mail.System").is_descendant_of(&tag("Mail")));
        assert!(tag("Mail").is_ancestor_of(&tag("Mail.System.Reward")));
        assert!(!tag("Mailbox").is_descendant_of(&tag("Mail")));
        assert!(!tag("Mail").is_descendant_of(&tag("Mail")));
    }

    #[test]
    fn invalid_tags_are_rejected() {
        for bad in ["", "Mail..System", ".Mail", "Mail.", "Mail System"] {
            assert!(RedDotTag::new(bad).is_err(), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn from_parts_trims_and_skips_empty() {
        let joined = RedDotTag::from_parts([" Bag ", "", "Weapon"]).unwrap();
        assert_eq!(joined.as_str(), "Bag.Weapon");
        assert!(RedDotTag::from_parts(["", "  "]).is_err());
    }

    #[test]
    fn serde_validates() {
        let parsed: RedDotTag = serde_json::from_str("\"Bag.Weapon\"").unwrap();
        assert_eq!(parsed, tag("Bag.Weapon"));
        assert!(serde_json::from_str::<RedDotTag>("\"Bag..Weapon\"").is_err());
    }
}
