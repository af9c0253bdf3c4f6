use rustc_hash::FxHashMap;
use std::fmt;

/// An aliasing class of memory. Two accesses with different identities
/// never alias, except that `ANY` aliases everything.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationIdentity(u32);

impl LocationIdentity {
    pub const ANY: LocationIdentity = LocationIdentity(0);
    pub const FINAL: LocationIdentity = LocationIdentity(1);

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_any(self) -> bool {
        self == Self::ANY
    }

    pub fn is_final(self) -> bool {
        self == Self::FINAL
    }
}

/// The identity plus an optional constant displacement. An access without
/// a displacement is indexed and can never fault at a known offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub identity: LocationIdentity,
    pub displacement: Option<i64>,
}

impl Location {
    pub fn constant(identity: LocationIdentity, displacement: i64) -> Self {
        Self {
            identity,
            displacement: Some(displacement),
        }
    }

    pub fn indexed(identity: LocationIdentity) -> Self {
        Self {
            identity,
            displacement: None,
        }
    }
}

pub const ANY_LOCATION_NAME: &str = "any";
pub const FINAL_LOCATION_NAME: &str = "final";

/// Interns location names. Scoped to a single graph.
#[derive(Debug, Clone)]
pub struct LocationMap {
    map: FxHashMap<String, LocationIdentity>,
    names: Vec<String>,
}

impl LocationMap {
    pub fn new() -> Self {
        let mut this = Self {
            map: FxHashMap::default(),
            names: vec![],
        };

        this.get_id(ANY_LOCATION_NAME);
        this.get_id(FINAL_LOCATION_NAME);

        this
    }

    pub fn get_id(&mut self, name: &str) -> LocationIdentity {
        match self.map.get(name) {
            Some(id) => *id,
            None => {
                let id = LocationIdentity(self.names.len() as u32);

                self.map.insert(name.to_string(), id);
                self.names.push(name.to_string());

                id
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<LocationIdentity> {
        self.map.get(name).copied()
    }

    pub fn get_str(&self, id: LocationIdentity) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for LocationMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ANY => write!(f, "{}", ANY_LOCATION_NAME),
            Self::FINAL => write!(f, "{}", FINAL_LOCATION_NAME),
            LocationIdentity(id) => write!(f, "loc{}", id),
        }
    }
}
