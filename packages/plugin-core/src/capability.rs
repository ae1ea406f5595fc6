use std::fmt;

/// One optional method of the plugin contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ProcessPhoto,
    Search,
    ValidateToken,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::ProcessPhoto,
        Capability::Search,
        Capability::ValidateToken,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::ProcessPhoto => 1 << 0,
            Capability::Search => 1 << 1,
            Capability::ValidateToken => 1 << 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::ProcessPhoto => "ProcessPhoto",
            Capability::Search => "Search",
            Capability::ValidateToken => "ValidateToken",
        }
    }
}

/// Bitmask of the methods a plugin advertised at registration. The supervisor
/// never calls a method outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    pub fn supports(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        Capability::ALL
            .iter()
            .filter(|c| self.supports(**c))
            .map(|c| c.name())
            .collect()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", self.names().join("|"))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::empty();
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_query() {
        let mut set = CapabilitySet::empty();
        assert!(set.is_empty());
        assert!(!set.supports(Capability::Search));

        set.insert(Capability::Search);
        set.insert(Capability::ValidateToken);

        assert!(set.supports(Capability::Search));
        assert!(set.supports(Capability::ValidateToken));
        assert!(!set.supports(Capability::ProcessPhoto));
    }

    #[test]
    fn insert_is_idempotent() {
        let mut set = CapabilitySet::empty();
        set.insert(Capability::ProcessPhoto);
        set.insert(Capability::ProcessPhoto);
        assert_eq!(set.names(), vec!["ProcessPhoto"]);
    }

    #[test]
    fn display_lists_names() {
        let set: CapabilitySet = [Capability::ProcessPhoto, Capability::Search]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "ProcessPhoto|Search");
        assert_eq!(CapabilitySet::empty().to_string(), "none");
    }
}
