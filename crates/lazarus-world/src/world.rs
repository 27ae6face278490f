//! In-memory reference host.
//!
//! [`SimWorld`] implements every collaborator trait in [`crate::host`] over a
//! plain map of records. It models the host behaviour the persistence engine
//! relies on:
//!
//! - composites, members and statics are addressed by generational
//!   [`EntityHandle`]s and looked up by name;
//! - spawning a composite whose name is already live replaces it;
//! - [`EntityRegistry::destroy`] is silent, while [`SimWorld::kill`]
//!   simulates a combat loss and queues a [`HostEvent::Destroyed`];
//! - a composite whose last member dies disappears with it.
//!
//! Failure injection ([`SimWorld::reject_spawns_of`],
//! [`SimWorld::reject_destroys_of`]) lets tests exercise the engine's
//! skip-and-continue error handling.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::entity::{EntityHandle, HandleAllocator};
use crate::host::{
    EntityRegistry, EntitySpawner, HostEvent, Notifier, Region, WorldQuery,
};
use crate::identity::{CompositeCategory, EntityCategory, FactionId, Skill};
use crate::scenario::{CompositeSpec, ScenarioDescription, StaticSpec, Transform};
use crate::WorldError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CompositeRecord {
    name: String,
    faction: FactionId,
    category: CompositeCategory,
    template: CompositeSpec,
    members: Vec<EntityHandle>,
}

#[derive(Debug, Clone)]
struct MemberRecord {
    name: String,
    composite: EntityHandle,
    category: CompositeCategory,
    skill: Skill,
    transform: Transform,
}

#[derive(Debug, Clone)]
struct StaticRecord {
    name: String,
    faction: FactionId,
    transform: Transform,
}

#[derive(Debug, Clone)]
enum Record {
    Composite(CompositeRecord),
    Member(MemberRecord),
    Static(StaticRecord),
}

impl Record {
    fn name(&self) -> &str {
        match self {
            Record::Composite(c) => &c.name,
            Record::Member(m) => &m.name,
            Record::Static(s) => &s.name,
        }
    }
}

// ---------------------------------------------------------------------------
// SimWorld
// ---------------------------------------------------------------------------

/// A self-contained simulation host.
#[derive(Debug, Default)]
pub struct SimWorld {
    allocator: HandleAllocator,
    records: HashMap<EntityHandle, Record>,
    composites_by_name: HashMap<String, EntityHandle>,
    members_by_name: HashMap<String, EntityHandle>,
    statics_by_name: HashMap<String, EntityHandle>,
    pending_events: Vec<HostEvent>,
    notices: Vec<String>,
    spawn_log: Vec<String>,
    destroy_log: Vec<String>,
    rejected_spawns: HashSet<String>,
    rejected_destroys: HashSet<String>,
}

impl SimWorld {
    /// An empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// A world populated with every composite and static object of the
    /// description, at their authored positions.
    ///
    /// # Errors
    ///
    /// Propagates the first [`WorldError`] raised while spawning (an invalid
    /// template in the description).
    pub fn from_scenario(description: &ScenarioDescription) -> Result<Self, WorldError> {
        let mut world = Self::new();
        for entry in description.composites() {
            world.spawn_composite(entry.faction, entry.category, entry.spec)?;
        }
        for (faction, object) in description.statics() {
            world.place_static(faction, object);
        }
        // Initial population is not a respawn.
        world.spawn_log.clear();
        Ok(world)
    }

    /// Place a static object, replacing any live static of the same name.
    pub fn place_static(&mut self, faction: FactionId, object: &StaticSpec) -> EntityHandle {
        if let Some(old) = self.statics_by_name.get(&object.name).copied() {
            self.remove(old);
        }
        let handle = self.allocator.allocate();
        self.records.insert(
            handle,
            Record::Static(StaticRecord {
                name: object.name.clone(),
                faction,
                transform: Transform::new(object.x, 0.0, object.z, object.heading),
            }),
        );
        self.statics_by_name.insert(object.name.clone(), handle);
        handle
    }

    // -- simulated play -----------------------------------------------------

    /// Destroy a member or static object as a combat loss, queueing a
    /// [`HostEvent::Destroyed`] notification.
    ///
    /// Returns `false` if nothing live carries that name.
    pub fn kill(&mut self, name: &str) -> bool {
        let (handle, category) = if let Some(&h) = self.members_by_name.get(name) {
            (h, EntityCategory::Unit)
        } else if let Some(&h) = self.statics_by_name.get(name) {
            (h, EntityCategory::Static)
        } else {
            return false;
        };
        let player_controlled = matches!(
            self.records.get(&handle),
            Some(Record::Member(m)) if m.skill.is_human()
        );
        self.remove(handle);
        self.pending_events.push(HostEvent::Destroyed {
            identity: name.to_owned(),
            category,
            player_controlled,
        });
        true
    }

    /// Move a live member.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownIdentity`] if no live member has that name.
    pub fn move_member(&mut self, name: &str, transform: Transform) -> Result<(), WorldError> {
        let handle = self
            .members_by_name
            .get(name)
            .copied()
            .ok_or_else(|| WorldError::UnknownIdentity(name.to_owned()))?;
        match self.records.get_mut(&handle) {
            Some(Record::Member(m)) => {
                m.transform = transform;
                Ok(())
            }
            _ => Err(WorldError::UnknownIdentity(name.to_owned())),
        }
    }

    /// Take every notification queued since the last call.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // -- failure injection --------------------------------------------------

    /// Make every future spawn of the named composite fail.
    pub fn reject_spawns_of(&mut self, composite: &str) {
        self.rejected_spawns.insert(composite.to_owned());
    }

    /// Make every future destroy of the named entity fail.
    pub fn reject_destroys_of(&mut self, name: &str) {
        self.rejected_destroys.insert(name.to_owned());
    }

    // -- inspection ---------------------------------------------------------

    /// Names of the live members of a composite, in spawn order.
    pub fn composite_members(&self, composite: &str) -> Option<Vec<String>> {
        let handle = self.composites_by_name.get(composite)?;
        match self.records.get(handle) {
            Some(Record::Composite(c)) => Some(
                c.members
                    .iter()
                    .filter_map(|h| self.records.get(h).map(|r| r.name().to_owned()))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// The template a live composite was last spawned from.
    pub fn spawned_template(&self, composite: &str) -> Option<&CompositeSpec> {
        let handle = self.composites_by_name.get(composite)?;
        match self.records.get(handle) {
            Some(Record::Composite(c)) => Some(&c.template),
            _ => None,
        }
    }

    /// Owning faction and category of a live composite.
    pub fn composite_origin(&self, composite: &str) -> Option<(FactionId, CompositeCategory)> {
        let handle = self.composites_by_name.get(composite)?;
        match self.records.get(handle) {
            Some(Record::Composite(c)) => Some((c.faction, c.category)),
            _ => None,
        }
    }

    /// Current placement of a live member.
    pub fn member_transform(&self, name: &str) -> Option<Transform> {
        let handle = self.members_by_name.get(name)?;
        match self.records.get(handle) {
            Some(Record::Member(m)) => Some(m.transform),
            _ => None,
        }
    }

    /// Owning faction of a live static object.
    pub fn static_faction(&self, name: &str) -> Option<FactionId> {
        let handle = self.statics_by_name.get(name)?;
        match self.records.get(handle) {
            Some(Record::Static(s)) => Some(s.faction),
            _ => None,
        }
    }

    /// `true` if a live member or static object carries the name.
    pub fn is_alive(&self, name: &str) -> bool {
        self.members_by_name.contains_key(name) || self.statics_by_name.contains_key(name)
    }

    pub fn composite_count(&self) -> usize {
        self.composites_by_name.len()
    }

    pub fn member_count(&self) -> usize {
        self.members_by_name.len()
    }

    pub fn static_count(&self) -> usize {
        self.statics_by_name.len()
    }

    /// Every notice shown through [`Notifier::notify`].
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Names of composites spawned through [`EntitySpawner`] since
    /// construction, in order.
    pub fn spawn_log(&self) -> &[String] {
        &self.spawn_log
    }

    /// Names of entities removed through [`EntityRegistry::destroy`], in
    /// order.
    pub fn destroy_log(&self) -> &[String] {
        &self.destroy_log
    }

    // -- internals ----------------------------------------------------------

    /// Remove an entity and everything it owns. Returns `false` for stale
    /// handles.
    fn remove(&mut self, handle: EntityHandle) -> bool {
        let Some(record) = self.records.remove(&handle) else {
            return false;
        };
        self.allocator.release(handle);
        match record {
            Record::Composite(c) => {
                if self.composites_by_name.get(&c.name) == Some(&handle) {
                    self.composites_by_name.remove(&c.name);
                }
                for member in c.members {
                    if let Some(Record::Member(m)) = self.records.remove(&member) {
                        self.allocator.release(member);
                        if self.members_by_name.get(&m.name) == Some(&member) {
                            self.members_by_name.remove(&m.name);
                        }
                    }
                }
            }
            Record::Member(m) => {
                if self.members_by_name.get(&m.name) == Some(&handle) {
                    self.members_by_name.remove(&m.name);
                }
                let now_empty = match self.records.get_mut(&m.composite) {
                    Some(Record::Composite(c)) => {
                        c.members.retain(|h| *h != handle);
                        c.members.is_empty()
                    }
                    _ => false,
                };
                if now_empty {
                    self.remove(m.composite);
                }
            }
            Record::Static(s) => {
                if self.statics_by_name.get(&s.name) == Some(&handle) {
                    self.statics_by_name.remove(&s.name);
                }
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Collaborator impls
// ---------------------------------------------------------------------------

impl EntityRegistry for SimWorld {
    fn find_by_identity(&self, category: EntityCategory, name: &str) -> Option<EntityHandle> {
        match category {
            EntityCategory::Unit => self.members_by_name.get(name).copied(),
            EntityCategory::Static => self.statics_by_name.get(name).copied(),
        }
    }

    fn find_composite(&self, name: &str) -> Option<EntityHandle> {
        self.composites_by_name.get(name).copied()
    }

    fn exists(&self, handle: EntityHandle) -> bool {
        self.allocator.is_live(handle) && self.records.contains_key(&handle)
    }

    fn destroy(&mut self, handle: EntityHandle) -> Result<(), WorldError> {
        let name = match self.records.get(&handle) {
            Some(record) => record.name().to_owned(),
            None => return Err(WorldError::UnknownEntity { handle }),
        };
        if self.rejected_destroys.contains(&name) {
            return Err(WorldError::DestroyFailure {
                target: name,
                reason: "rejected by host".to_owned(),
            });
        }
        self.remove(handle);
        debug!(target_name = %name, %handle, "entity destroyed");
        self.destroy_log.push(name);
        Ok(())
    }
}

impl EntitySpawner for SimWorld {
    fn spawn_composite(
        &mut self,
        faction: FactionId,
        category: CompositeCategory,
        template: &CompositeSpec,
    ) -> Result<EntityHandle, WorldError> {
        if template.members.is_empty() {
            return Err(WorldError::InvalidTemplate {
                composite: template.name.clone(),
                reason: "no members".to_owned(),
            });
        }
        let mut seen = HashSet::new();
        for member in &template.members {
            if !seen.insert(member.name.as_str()) {
                return Err(WorldError::InvalidTemplate {
                    composite: template.name.clone(),
                    reason: format!("member '{}' listed twice", member.name),
                });
            }
        }
        if self.rejected_spawns.contains(&template.name) {
            return Err(WorldError::SpawnFailure {
                composite: template.name.clone(),
                reason: "rejected by host".to_owned(),
            });
        }

        // Same-name spawns replace what is live, composite and members alike.
        if let Some(old) = self.composites_by_name.get(&template.name).copied() {
            self.remove(old);
        }
        for member in &template.members {
            if let Some(old) = self.members_by_name.get(&member.name).copied() {
                self.remove(old);
            }
        }

        let composite = self.allocator.allocate();
        let mut members = Vec::with_capacity(template.members.len());
        for spec in &template.members {
            let handle = self.allocator.allocate();
            self.records.insert(
                handle,
                Record::Member(MemberRecord {
                    name: spec.name.clone(),
                    composite,
                    category,
                    skill: spec.skill,
                    transform: spec.transform(),
                }),
            );
            self.members_by_name.insert(spec.name.clone(), handle);
            members.push(handle);
        }
        self.records.insert(
            composite,
            Record::Composite(CompositeRecord {
                name: template.name.clone(),
                faction,
                category,
                template: template.clone(),
                members,
            }),
        );
        self.composites_by_name
            .insert(template.name.clone(), composite);
        self.spawn_log.push(template.name.clone());
        debug!(
            composite = %template.name,
            %faction,
            %category,
            members = template.members.len(),
            "composite spawned"
        );
        Ok(composite)
    }
}

impl WorldQuery for SimWorld {
    fn find_all_in_region(
        &self,
        category: CompositeCategory,
        region: &Region,
    ) -> Vec<EntityHandle> {
        let mut found: Vec<(&str, EntityHandle)> = self
            .members_by_name
            .iter()
            .filter_map(|(name, &handle)| match self.records.get(&handle) {
                Some(Record::Member(m)) if m.category == category && region.contains(&m.transform) => {
                    Some((name.as_str(), handle))
                }
                _ => None,
            })
            .collect();
        found.sort_unstable_by(|a, b| a.0.cmp(b.0));
        found.into_iter().map(|(_, h)| h).collect()
    }

    fn transform_of(&self, handle: EntityHandle) -> Option<(String, Transform)> {
        match self.records.get(&handle) {
            Some(Record::Member(m)) => Some((m.name.clone(), m.transform)),
            Some(Record::Static(s)) => Some((s.name.clone(), s.transform)),
            _ => None,
        }
    }
}

impl Notifier for SimWorld {
    fn notify(&mut self, message: &str, display_secs: f64) {
        info!(display_secs, "notice: {message}");
        self.notices.push(message.to_owned());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
