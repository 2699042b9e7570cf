//! Process tag sets: an unordered collection of application-defined labels.
//!
//! The source vocabulary is a closed `Enum` subclass; Rust has no closed-set
//! analogue that a library can accept from arbitrary downstream crates
//! without a generic parameter, so tags here are interned string labels
//! instead. Method names (`has_tag`, `tag_with`, `untag`, `clear_tags`,
//! `iter_tags`) are kept matching the source vocabulary.

use std::collections::HashSet;

/// One tag value.
pub type Tag = String;

/// The set of tags carried by a [`crate::Process`] or declared on a body
/// function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(HashSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        TagSet(HashSet::new())
    }

    pub fn from_iter<I: IntoIterator<Item = Tag>>(tags: I) -> Self {
        TagSet(tags.into_iter().collect())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn tag_with<I: IntoIterator<Item = Tag>>(&mut self, tags: I) {
        self.0.extend(tags);
    }

    pub fn untag<I: IntoIterator<Item = Tag>>(&mut self, tags: I) {
        for t in tags {
            self.0.remove(&t);
        }
    }

    pub fn clear_tags(&mut self) {
        self.0.clear();
    }

    pub fn iter_tags(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// The tag set a freshly spawned process inherits: the union of the
    /// spawning process's tags (if any) and the tags declared on the new
    /// process's body.
    pub fn inherit(parent: Option<&TagSet>, declared: &TagSet) -> TagSet {
        let mut merged = parent.cloned().unwrap_or_default();
        merged.tag_with(declared.0.iter().cloned());
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_with_and_has_tag() {
        let mut t = TagSet::new();
        t.tag_with(["alice".to_string()]);
        assert!(t.has_tag("alice"));
        assert!(!t.has_tag("bob"));
    }

    #[test]
    fn untag_removes_only_named_tags() {
        let mut t = TagSet::from_iter(["alice".to_string(), "bob".to_string()]);
        t.untag(["alice".to_string()]);
        assert!(!t.has_tag("alice"));
        assert!(t.has_tag("bob"));
    }

    #[test]
    fn inherit_unions_parent_and_declared() {
        let parent = TagSet::from_iter(["alice".to_string()]);
        let declared = TagSet::from_iter(["bob".to_string()]);
        let merged = TagSet::inherit(Some(&parent), &declared);
        assert!(merged.has_tag("alice"));
        assert!(merged.has_tag("bob"));
    }
}
