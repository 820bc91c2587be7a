use semver::Version;

/// A single bound within a conjunctive clause.
#[derive(Debug, Clone)]
pub enum Comparator {
    Exact(Version),
    GreaterThan(Version),
    GreaterThanOrEqual(Version),
    LessThan(Version),
    LessThanOrEqual(Version),
    /// A bare `*`/`x` with no attached version; always matches, never
    /// opts a clause into matching prereleases.
    Wildcard,
}

impl Comparator {
    #[must_use]
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Exact(v)
            | Self::GreaterThan(v)
            | Self::GreaterThanOrEqual(v)
            | Self::LessThan(v)
            | Self::LessThanOrEqual(v) => Some(v),
            Self::Wildcard => None,
        }
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::GreaterThan(v) => version > v,
            Self::GreaterThanOrEqual(v) => version >= v,
            Self::LessThan(v) => version < v,
            Self::LessThanOrEqual(v) => version <= v,
            Self::Wildcard => true,
        }
    }
}

/// A conjunction (AND) of comparators; a [`Range`] (the whole parsed
/// expression) is a disjunction (OR) of these.
#[derive(Debug, Clone, Default)]
pub struct Clause {
    pub comparators: Vec<Comparator>,
}

impl Clause {
    #[must_use]
    pub fn new(comparators: Vec<Comparator>) -> Self {
        Self { comparators }
    }

    #[must_use]
    pub fn wildcard() -> Self {
        Self::new(vec![Comparator::Wildcard])
    }

    /// npm's `includePrerelease=false` default: a prerelease version only
    /// satisfies this clause if some comparator in it targets the exact
    /// same `major.minor.patch` tuple and itself carries a prerelease.
    #[must_use]
    fn allows_prerelease_of(&self, version: &Version) -> bool {
        if version.pre.is_empty() {
            return true;
        }
        self.comparators.iter().any(|c| {
            c.version().is_some_and(|cv| {
                !cv.pre.is_empty()
                    && cv.major == version.major
                    && cv.minor == version.minor
                    && cv.patch == version.patch
            })
        })
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        if self.comparators.is_empty() {
            return true;
        }
        if !self.allows_prerelease_of(version) {
            return false;
        }
        self.comparators.iter().all(|c| c.matches(version))
    }
}

/// A full parsed range expression: a disjunction of [`Clause`]s.
#[derive(Debug, Clone)]
pub struct Range {
    pub clauses: Vec<Clause>,
}

impl Range {
    #[must_use]
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses.iter().any(|clause| clause.matches(version))
    }
}
