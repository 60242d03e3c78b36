/// Tri-state reachability mark carried by every shrinkable entity.
///
/// Marks are per-run state: they are never serialized and
/// [`ClassPath::reset_marks`](super::ClassPath::reset_marks) clears them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UsageMark {
    /// Nothing has reached the entity
    #[default]
    Unused,
    /// Reached through a relationship whose owner is not confirmed yet
    PossiblyUsed,
    /// Confirmed reachable; survives shrinking
    Used,
}

impl UsageMark {
    pub fn is_used(&self) -> bool {
        *self == UsageMark::Used
    }

    pub fn is_possibly_used(&self) -> bool {
        *self == UsageMark::PossiblyUsed
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageMark::Unused => "unused",
            UsageMark::PossiblyUsed => "possibly used",
            UsageMark::Used => "used",
        }
    }
}

impl std::fmt::Display for UsageMark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
