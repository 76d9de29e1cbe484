use std::collections::HashMap;

use crate::red_dot_tag::RedDotTag;

/// Memoized strict descendants of queried tags.
///
/// An entry holds only tags that were registered when it was computed, so
/// every change to the set of registered tags must invalidate the entries
/// keyed at the changed tag's ancestors.
#[derive(Debug, Default)]
pub struct DescendantCache {
    cache: HashMap<RedDotTag, Vec<RedDotTag>>,
}

impl DescendantCache {
    /// Registered strict descendants of `tag`, sorted so parents precede
    /// their children.
    pub fn find_all_descendants<'a>(
        &mut self,
        tag: &RedDotTag,
        registered: impl IntoIterator<Item = &'a RedDotTag>,
    ) -> Vec<RedDotTag> {
        self.cache
            .entry(tag.clone())
            .or_insert_with(|| {
                let mut descendants: Vec<RedDotTag> = registered
                    .into_iter()
                    .filter(|candidate| candidate.is_descendant_of(tag))
                    .cloned()
                    .collect();
                descendants.sort();
                descendants
            })
            .clone()
    }

    /// Drops every entry keyed at a strict ancestor of `tag`.
    pub fn invalidate_ancestors_of(&mut self, tag: &RedDotTag) {
        if self.cache.is_empty() {
            return;
        }
        for ancestor in tag.ancestors() {
            self.cache.remove(&ancestor);
        }
    }

    pub fn remove(&mut self, tag: &RedDotTag) {
        self.cache.remove(tag);
    }

    pub fn cached(&self, tag: &RedDotTag) -> Option<&[RedDotTag]> {
        self.cache.get(tag).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<RedDotTag> {
        names.iter().map(|n| RedDotTag::new(n).unwrap()).collect()
    }

    #[test]
    fn descendants_are_memoized_and_sorted() {
        let registered = tags(&["Bag", "Bag.Weapon.Sword", "Bag.Weapon", "Bagpipe", "Shop"]);
        let mut cache = DescendantCache::default();
        let bag = RedDotTag::new("Bag").unwrap();

        let found = cache.find_all_descendants(&bag, &registered);
        assert_eq!(found, tags(&["Bag.Weapon", "Bag.Weapon.Sword"]));
        assert_eq!(cache.len(), 1);

        // memoized, so the new registration is invisible until invalidated
        let mut registered = registered;
        registered.extend(tags(&["Bag.Armor"]));
        assert_eq!(cache.find_all_descendants(&bag, &registered).len(), 2);
    }

    #[test]
    fn invalidation_only_touches_ancestors() {
        let registered = tags(&["Bag", "Bag.Weapon", "Shop"]);
        let mut cache = DescendantCache::default();
        for tag in registered.iter() {
            cache.find_all_descendants(tag, &registered);
        }
        assert_eq!(cache.len(), 3);

        cache.invalidate_ancestors_of(&RedDotTag::new("Bag.Weapon.Axe").unwrap());
        let bag = RedDotTag::new("Bag").unwrap();
        let weapon = RedDotTag::new("Bag.Weapon").unwrap();
        let shop = RedDotTag::new("Shop").unwrap();
        assert!(cache.cached(&bag).is_none());
        assert!(cache.cached(&weapon).is_none());
        assert!(cache.cached(&shop).is_some());
    }
}
