//! Deduplicated, insertion-ordered resource collection

use indexmap::IndexMap;
use octofhir_refresh_model::{Resource, ResourceKey, ResourceType};
use std::path::PathBuf;
use std::sync::Arc;

/// Why a resource is part of a closure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The artifact the closure was computed for
    Root,
    Library,
    Terminology,
    TestFixture,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub resource: Arc<Resource>,
    pub role: Role,
    /// File the resource was loaded from, when known
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Keyed(ResourceKey),
    /// Resources without an id never collide
    Anonymous(usize),
}

/// Resources keyed by `(type, id)` in first-seen order
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    members: IndexMap<Slot, Member>,
    anonymous: usize,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member; returns `false` when its key is already present
    pub fn insert(&mut self, resource: Arc<Resource>, role: Role, path: Option<PathBuf>) -> bool {
        let member = Member {
            resource,
            role,
            path,
        };
        let slot = match member.resource.key() {
            Some(key) => Slot::Keyed(key),
            None => {
                self.anonymous += 1;
                Slot::Anonymous(self.anonymous)
            }
        };
        if self.members.contains_key(&slot) {
            return false;
        }
        self.members.insert(slot, member);
        true
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.members.contains_key(&Slot::Keyed(key.clone()))
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&Member> {
        self.members.get(&Slot::Keyed(key.clone()))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn root(&self) -> Option<&Member> {
        self.iter().find(|m| m.role == Role::Root)
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &Member> {
        self.iter().filter(move |m| m.role == role)
    }

    /// Keys in order, skipping anonymous members
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.members
            .keys()
            .filter_map(|slot| match slot {
                Slot::Keyed(key) => Some(key.clone()),
                Slot::Anonymous(_) => None,
            })
            .collect()
    }

    /// Members of one resource type
    pub fn of_type<'a>(&'a self, kind: &'a ResourceType) -> impl Iterator<Item = &'a Member> {
        self.iter()
            .filter(move |m| m.resource.resource_type() == *kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(kind: ResourceType, id: Option<&str>) -> Arc<Resource> {
        let mut r = Resource::new(kind);
        if let Some(id) = id {
            r.set_id(id);
        }
        Arc::new(r)
    }

    #[test]
    fn test_dedup_by_type_and_id() {
        let mut set = ResourceSet::new();
        assert!(set.insert(resource(ResourceType::Library, Some("A")), Role::Root, None));
        assert!(set.insert(resource(ResourceType::ValueSet, Some("A")), Role::Terminology, None));
        assert!(!set.insert(resource(ResourceType::Library, Some("A")), Role::Library, None));
        assert_eq!(set.len(), 2);
        assert_eq!(set.root().unwrap().resource.resource_type(), ResourceType::Library);
    }

    #[test]
    fn test_anonymous_members_kept() {
        let mut set = ResourceSet::new();
        set.insert(resource(ResourceType::Other("Patient".into()), None), Role::TestFixture, None);
        set.insert(resource(ResourceType::Other("Patient".into()), None), Role::TestFixture, None);
        set.insert(resource(ResourceType::Library, Some("A")), Role::Root, None);
        assert_eq!(set.len(), 3);
        assert_eq!(set.keys().len(), 1);
        assert_eq!(set.iter().last().unwrap().role, Role::Root);
    }
}
