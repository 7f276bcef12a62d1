//! Named member groups a type exposes for selection by string
//!
//! A backend registers handlers such as `mode_full` or `method_fresh` once
//! per type. Configuration values then pick a handler by name at runtime:
//!
//! ```
//! use std::sync::OnceLock;
//! use cistep_steps::attr_group::{AttrGroups, HasAttrGroups};
//!
//! struct Svn;
//!
//! impl HasAttrGroups for Svn {
//!     type Member = fn() -> &'static str;
//!
//!     fn attr_groups() -> &'static AttrGroups<Self::Member> {
//!         static GROUPS: OnceLock<AttrGroups<fn() -> &'static str>> = OnceLock::new();
//!         GROUPS.get_or_init(|| {
//!             AttrGroups::<fn() -> &'static str>::builder()
//!                 .member("mode", "full", || "export")
//!                 .member("mode", "incremental", || "update")
//!                 .build()
//!         })
//!     }
//! }
//!
//! assert!(Svn::has_attr_group_member("mode", "full"));
//! assert!(Svn::get_attr_group_member("mode", "copy").is_err());
//! ```

use cistep_errors::{Error, StepError};
use std::collections::{BTreeMap, HashSet};

/// Registration table: group name to member name to handler
#[derive(Debug, Clone)]
pub struct AttrGroups<M> {
    groups: BTreeMap<String, BTreeMap<String, M>>,
}

impl<M> Default for AttrGroups<M> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<M> AttrGroups<M> {
    #[must_use]
    pub fn builder() -> AttrGroupsBuilder<M> {
        AttrGroupsBuilder {
            table: Self::default(),
        }
    }

    /// Conventional display name of a member, e.g. `mode_full`
    #[must_use]
    pub fn qualified_name(group: &str, member: &str) -> String {
        format!("{group}_{member}")
    }

    #[must_use]
    pub fn has_member(&self, group: &str, member: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains_key(member))
    }

    /// Fetch a member handler
    ///
    /// # Errors
    ///
    /// Returns `StepError::UnknownAttrGroupMember` if nothing is registered
    /// under that group and member name.
    pub fn get_member(&self, group: &str, member: &str) -> Result<&M, Error> {
        self.groups
            .get(group)
            .and_then(|members| members.get(member))
            .ok_or_else(|| {
                StepError::UnknownAttrGroupMember {
                    group: group.to_string(),
                    member: member.to_string(),
                }
                .into()
            })
    }

    /// Member names registered under `group`; empty for unknown groups
    #[must_use]
    pub fn list_members(&self, group: &str) -> HashSet<String> {
        self.groups
            .get(group)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Member names under `group` in lexical order
    #[must_use]
    pub fn sorted_members(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Builder used to populate a table once per type
#[derive(Debug)]
pub struct AttrGroupsBuilder<M> {
    table: AttrGroups<M>,
}

impl<M: Clone> AttrGroupsBuilder<M> {
    /// Start from every registration of a parent type
    ///
    /// Members registered afterwards replace inherited ones of the same name.
    #[must_use]
    pub fn inherit(mut self, parent: &AttrGroups<M>) -> Self {
        for (group, members) in &parent.groups {
            let entry = self.table.groups.entry(group.clone()).or_default();
            for (name, handler) in members {
                entry.insert(name.clone(), handler.clone());
            }
        }
        self
    }
}

impl<M> AttrGroupsBuilder<M> {
    #[must_use]
    pub fn member(mut self, group: &str, member: &str, handler: M) -> Self {
        self.table
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(member.to_string(), handler);
        self
    }

    #[must_use]
    pub fn build(self) -> AttrGroups<M> {
        self.table
    }
}

/// Types that expose an attribute-group table
///
/// Implementors return a table built once, typically from a `OnceLock`
/// static. The provided methods never fail except
/// [`get_attr_group_member`](Self::get_attr_group_member).
pub trait HasAttrGroups {
    type Member: 'static;

    fn attr_groups() -> &'static AttrGroups<Self::Member>;

    fn has_attr_group_member(group: &str, member: &str) -> bool {
        Self::attr_groups().has_member(group, member)
    }

    /// # Errors
    ///
    /// Returns a lookup error when the member does not exist.
    fn get_attr_group_member(group: &str, member: &str) -> Result<&'static Self::Member, Error> {
        Self::attr_groups().get_member(group, member)
    }

    fn list_attr_group_members(group: &str) -> HashSet<String> {
        Self::attr_groups().list_members(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    type Marker = fn() -> &'static str;

    struct Base;
    struct WithModes;
    struct Overriding;

    impl HasAttrGroups for Base {
        type Member = Marker;

        fn attr_groups() -> &'static AttrGroups<Marker> {
            static GROUPS: OnceLock<AttrGroups<Marker>> = OnceLock::new();
            GROUPS.get_or_init(|| {
                AttrGroups::<Marker>::builder()
                    .member("other", "method", || "base other")
                    .member("mode", "copy", || "base copy")
                    .build()
            })
        }
    }

    // Registers mode_full and mode_incremental plus an unrelated member.
    impl HasAttrGroups for WithModes {
        type Member = Marker;

        fn attr_groups() -> &'static AttrGroups<Marker> {
            static GROUPS: OnceLock<AttrGroups<Marker>> = OnceLock::new();
            GROUPS.get_or_init(|| {
                AttrGroups::<Marker>::builder()
                    .member("mode", "full", || "full")
                    .member("mode", "incremental", || "incremental")
                    .member("other", "method", || "other")
                    .build()
            })
        }
    }

    impl HasAttrGroups for Overriding {
        type Member = Marker;

        fn attr_groups() -> &'static AttrGroups<Marker> {
            static GROUPS: OnceLock<AttrGroups<Marker>> = OnceLock::new();
            GROUPS.get_or_init(|| {
                AttrGroups::<Marker>::builder()
                    .inherit(Base::attr_groups())
                    .member("mode", "copy", || "child copy")
                    .member("mode", "full", || "child full")
                    .build()
            })
        }
    }

    #[test]
    fn has_member() {
        assert!(WithModes::has_attr_group_member("mode", "full"));
        assert!(WithModes::has_attr_group_member("mode", "incremental"));
        assert!(!WithModes::has_attr_group_member("mode", "nothing"));
        assert!(!WithModes::has_attr_group_member("nogroup", "full"));
    }

    #[test]
    fn get_member() {
        let full = WithModes::get_attr_group_member("mode", "full").unwrap();
        assert_eq!(full(), "full");

        let err = WithModes::get_attr_group_member("mode", "nothing").unwrap_err();
        assert!(matches!(
            err,
            Error::Step(StepError::UnknownAttrGroupMember { ref group, ref member })
                if group == "mode" && member == "nothing"
        ));
    }

    #[test]
    fn list_members() {
        let mut members: Vec<_> = WithModes::list_attr_group_members("mode")
            .into_iter()
            .collect();
        members.sort();
        assert_eq!(members, ["full", "incremental"]);
        assert!(WithModes::list_attr_group_members("nogroup").is_empty());
    }

    #[test]
    fn inherited_members_are_listed_once() {
        assert_eq!(
            Overriding::attr_groups().sorted_members("mode"),
            ["copy", "full"]
        );
        assert!(Overriding::has_attr_group_member("other", "method"));
        let copy = Overriding::get_attr_group_member("mode", "copy").unwrap();
        assert_eq!(copy(), "child copy");
        // Parent table is untouched by the child's override
        let base_copy = Base::get_attr_group_member("mode", "copy").unwrap();
        assert_eq!(base_copy(), "base copy");
    }

    #[test]
    fn qualified_name() {
        assert_eq!(AttrGroups::<Marker>::qualified_name("mode", "full"), "mode_full");
    }
}
