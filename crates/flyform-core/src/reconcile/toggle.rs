// ── Pipeline toggle calls ──

use strum::Display;

use crate::client::{ClientError, ConcourseClient};

/// Single-purpose mutation flipping one boolean facet of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Toggle {
    Pause,
    Unpause,
    Expose,
    Hide,
}

impl Toggle {
    /// Call that leaves the pipeline's paused flag at `paused`.
    pub fn paused(paused: bool) -> Self {
        if paused { Self::Pause } else { Self::Unpause }
    }

    /// Call that leaves the pipeline's public flag at `public`.
    pub fn public(public: bool) -> Self {
        if public { Self::Expose } else { Self::Hide }
    }

    /// Name of the sub-step, for error context.
    pub fn step(self) -> &'static str {
        match self {
            Self::Pause => "pause pipeline",
            Self::Unpause => "unpause pipeline",
            Self::Expose => "expose pipeline",
            Self::Hide => "hide pipeline",
        }
    }

    pub fn apply<C>(self, client: &C, team: &str, name: &str) -> Result<bool, ClientError>
    where
        C: ConcourseClient + ?Sized,
    {
        match self {
            Self::Pause => client.pause_pipeline(team, name),
            Self::Unpause => client.unpause_pipeline(team, name),
            Self::Expose => client.expose_pipeline(team, name),
            Self::Hide => client.hide_pipeline(team, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_pick_the_matching_call() {
        assert_eq!(Toggle::paused(true), Toggle::Pause);
        assert_eq!(Toggle::paused(false), Toggle::Unpause);
        assert_eq!(Toggle::public(true), Toggle::Expose);
        assert_eq!(Toggle::public(false), Toggle::Hide);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Toggle::Unpause.to_string(), "unpause");
    }
}
