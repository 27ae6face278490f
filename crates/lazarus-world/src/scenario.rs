//! Static scenario description: the read-only facts a scenario was authored
//! with.
//!
//! A [`ScenarioDescription`] names the theatre and scenario title and lists,
//! per faction and per [`CompositeCategory`], every composite entity template
//! ([`CompositeSpec`]) together with its ordered members ([`MemberSpec`]).
//! Standalone static objects are listed per faction as [`StaticSpec`]s.
//!
//! The description is plain data. Hosts construct it from whatever authoring
//! format they use; tests and demos build it in code or load it from JSON
//! via [`ScenarioDescription::from_json_str`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::{CompositeCategory, FactionId, Skill};
use crate::WorldError;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Last-known placement of an entity.
///
/// `x` and `z` span the ground plane, `y` is altitude, `heading` is in
/// radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
}

impl Transform {
    /// Build a transform from its four components.
    pub fn new(x: f64, y: f64, z: f64, heading: f64) -> Self {
        Self { x, y, z, heading }
    }
}

// ---------------------------------------------------------------------------
// MemberSpec
// ---------------------------------------------------------------------------

/// One member of a composite template.
///
/// Anything the persistence engine does not interpret (loadout, livery,
/// callsign, ...) travels untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSpec {
    /// Unique identity of the member within the scenario.
    pub name: String,
    /// Host type name, e.g. `"T-72B"`.
    pub kind: String,
    #[serde(default)]
    pub skill: Skill,
    pub x: f64,
    pub z: f64,
    /// Altitude, only meaningful for air categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
    #[serde(default)]
    pub heading: f64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MemberSpec {
    /// A member with default skill, zero heading and no extra fields.
    pub fn new(name: impl Into<String>, kind: impl Into<String>, x: f64, z: f64) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            skill: Skill::default(),
            x,
            z,
            alt: None,
            heading: 0.0,
            extra: serde_json::Map::new(),
        }
    }

    /// Builder-style skill override.
    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skill = skill;
        self
    }

    /// Builder-style altitude override.
    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = Some(alt);
        self
    }

    /// Builder-style heading override.
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    /// Builder-style extra field.
    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_owned(), value);
        self
    }

    /// The member's authored placement as a [`Transform`].
    pub fn transform(&self) -> Transform {
        Transform::new(self.x, self.alt.unwrap_or(0.0), self.z, self.heading)
    }
}

// ---------------------------------------------------------------------------
// CompositeSpec
// ---------------------------------------------------------------------------

/// A composite entity template: a named group of individually tracked
/// members spawned together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSpec {
    pub name: String,
    pub members: Vec<MemberSpec>,
    /// Route, tasking and other host data carried through respawns verbatim.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CompositeSpec {
    pub fn new(name: impl Into<String>, members: Vec<MemberSpec>) -> Self {
        Self {
            name: name.into(),
            members,
            extra: serde_json::Map::new(),
        }
    }

    /// Look up a member by identity.
    pub fn member(&self, name: &str) -> Option<&MemberSpec> {
        self.members.iter().find(|m| m.name == name)
    }

    /// `true` if any member seat is human-controlled.
    pub fn has_human_member(&self) -> bool {
        self.members.iter().any(|m| m.skill.is_human())
    }
}

// ---------------------------------------------------------------------------
// StaticSpec
// ---------------------------------------------------------------------------

/// A standalone static object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticSpec {
    pub name: String,
    pub kind: String,
    pub x: f64,
    pub z: f64,
    #[serde(default)]
    pub heading: f64,
}

impl StaticSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, x: f64, z: f64) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            x,
            z,
            heading: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// FactionSpec
// ---------------------------------------------------------------------------

/// Everything one faction brings to the scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FactionSpec {
    pub id: FactionId,
    #[serde(default)]
    pub name: String,
    /// Composite templates grouped by spawn category.
    #[serde(default)]
    pub composites: BTreeMap<CompositeCategory, Vec<CompositeSpec>>,
    #[serde(default)]
    pub statics: Vec<StaticSpec>,
}

impl FactionSpec {
    pub fn new(id: FactionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style: append a composite template under `category`.
    pub fn with_composite(mut self, category: CompositeCategory, composite: CompositeSpec) -> Self {
        self.composites.entry(category).or_default().push(composite);
        self
    }

    /// Builder-style: append a static object.
    pub fn with_static(mut self, object: StaticSpec) -> Self {
        self.statics.push(object);
        self
    }
}

// ---------------------------------------------------------------------------
// ScenarioDescription
// ---------------------------------------------------------------------------

/// The static, authored description of a scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioDescription {
    /// Theatre / map name.
    pub theatre: String,
    /// Scenario title.
    pub title: String,
    #[serde(default)]
    pub factions: Vec<FactionSpec>,
}

/// A composite template together with where it sits in the description.
#[derive(Debug, Clone, Copy)]
pub struct CompositeEntry<'a> {
    pub faction: FactionId,
    pub category: CompositeCategory,
    pub spec: &'a CompositeSpec,
}

impl ScenarioDescription {
    pub fn new(theatre: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            theatre: theatre.into(),
            title: title.into(),
            factions: Vec::new(),
        }
    }

    /// Builder-style: append a faction.
    pub fn with_faction(mut self, faction: FactionSpec) -> Self {
        self.factions.push(faction);
        self
    }

    /// Parse a description from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDescription`] if the JSON does not match
    /// the description schema.
    pub fn from_json_str(json: &str) -> Result<Self, WorldError> {
        serde_json::from_str(json).map_err(|e| WorldError::InvalidDescription(e.to_string()))
    }

    /// Iterate every composite template in declaration order: factions as
    /// listed, categories in [`CompositeCategory`] order, composites as
    /// listed.
    pub fn composites(&self) -> impl Iterator<Item = CompositeEntry<'_>> {
        self.factions.iter().flat_map(|faction| {
            faction.composites.iter().flat_map(move |(category, specs)| {
                specs.iter().map(move |spec| CompositeEntry {
                    faction: faction.id,
                    category: *category,
                    spec,
                })
            })
        })
    }

    /// Iterate every static object with its owning faction.
    pub fn statics(&self) -> impl Iterator<Item = (FactionId, &StaticSpec)> {
        self.factions
            .iter()
            .flat_map(|f| f.statics.iter().map(move |s| (f.id, s)))
    }

    /// Sorted composite names per faction, keyed by faction id.
    pub fn composite_names_by_faction(&self) -> BTreeMap<FactionId, Vec<&str>> {
        let mut out: BTreeMap<FactionId, Vec<&str>> = BTreeMap::new();
        for entry in self.composites() {
            out.entry(entry.faction)
                .or_default()
                .push(entry.spec.name.as_str());
        }
        for names in out.values_mut() {
            names.sort_unstable();
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScenarioDescription {
        ScenarioDescription::new("Caucasus", "Op Anvil")
            .with_faction(
                FactionSpec::new(FactionId(2), "blue")
                    .with_composite(CompositeCategory::Plane, plane_group("Eagle-1"))
                    .with_composite(
                        CompositeCategory::Ground,
                        CompositeSpec::new("Armor-B", vec![MemberSpec::new("B-1", "M1A2", 0.0, 0.0)]),
                    ),
            )
            .with_faction(
                FactionSpec::new(FactionId(1), "red")
                    .with_composite(
                        CompositeCategory::Ground,
                        CompositeSpec::new("Armor-A", vec![MemberSpec::new("A-1", "T-72B", 1.0, 2.0)]),
                    )
                    .with_static(StaticSpec::new("Depot", "warehouse", 5.0, 5.0)),
            )
    }

    fn plane_group(name: &str) -> CompositeSpec {
        CompositeSpec::new(
            name,
            vec![MemberSpec::new(format!("{name}-1"), "F-15C", 0.0, 0.0)
                .with_alt(3000.0)
                .with_skill(Skill::Client)],
        )
    }

    #[test]
    fn composites_walk_factions_then_categories() {
        let desc = sample();
        let names: Vec<_> = desc.composites().map(|e| e.spec.name.as_str()).collect();
        // Ground sorts before Plane within the blue faction.
        assert_eq!(names, vec!["Armor-B", "Eagle-1", "Armor-A"]);
    }

    #[test]
    fn names_by_faction_are_sorted_per_faction() {
        let desc = sample();
        let by_faction = desc.composite_names_by_faction();
        assert_eq!(by_faction[&FactionId(2)], vec!["Armor-B", "Eagle-1"]);
        assert_eq!(by_faction[&FactionId(1)], vec!["Armor-A"]);
    }

    #[test]
    fn human_member_detection() {
        let desc = sample();
        let eagle = desc.composites().find(|e| e.spec.name == "Eagle-1").unwrap();
        assert!(eagle.spec.has_human_member());
        let armor = desc.composites().find(|e| e.spec.name == "Armor-A").unwrap();
        assert!(!armor.spec.has_human_member());
    }

    #[test]
    fn member_transform_uses_altitude_as_y() {
        let m = MemberSpec::new("M", "Ka-50", 10.0, 20.0)
            .with_alt(150.0)
            .with_heading(1.0);
        assert_eq!(m.transform(), Transform::new(10.0, 150.0, 20.0, 1.0));
    }

    #[test]
    fn description_parses_from_json() {
        let json = r#"{
            "theatre": "Syria",
            "title": "Convoy",
            "factions": [{
                "id": 1,
                "composites": {
                    "ground": [{
                        "name": "Convoy-1",
                        "members": [
                            {"name": "Truck-1", "kind": "Ural", "x": 1.0, "z": 2.0,
                             "extra": {"livery": "desert"}}
                        ]
                    }]
                }
            }]
        }"#;
        let desc = ScenarioDescription::from_json_str(json).unwrap();
        let entry = desc.composites().next().unwrap();
        assert_eq!(entry.category, CompositeCategory::Ground);
        assert_eq!(entry.spec.members[0].extra["livery"], "desert");
        assert_eq!(entry.spec.members[0].skill, Skill::Average);
    }

    #[test]
    fn malformed_description_is_rejected() {
        let err = ScenarioDescription::from_json_str("{\"theatre\": 3}").unwrap_err();
        assert!(matches!(err, WorldError::InvalidDescription(_)));
    }
}
