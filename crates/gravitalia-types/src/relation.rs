use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Edge types a user can hold toward another node.
///
/// This is the only source of relation and label names that ever get
/// spliced into query text, so every variant maps to a fixed string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Subscriber,
    Like,
    Block,
    View,
    Love,
    Request,
}

/// Node label a relation points at, with the property used to look it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLabel {
    User,
    Post,
    Comment,
}

impl RelationKind {
    pub const ALL: [RelationKind; 6] = [
        Self::Subscriber,
        Self::Like,
        Self::Block,
        Self::View,
        Self::Love,
        Self::Request,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscriber => "Subscriber",
            Self::Like => "Like",
            Self::Block => "Block",
            Self::View => "View",
            Self::Love => "Love",
            Self::Request => "Request",
        }
    }

    pub fn target(self) -> TargetLabel {
        match self {
            Self::Subscriber | Self::Block | Self::Request => TargetLabel::User,
            Self::Like | Self::View => TargetLabel::Post,
            Self::Love => TargetLabel::Comment,
        }
    }

    /// `Request` edges only change through the subscribe flow and the
    /// accept/decline endpoint.
    pub fn is_toggleable(self) -> bool {
        !matches!(self, Self::Request)
    }
}

impl TargetLabel {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Post => "Post",
            Self::Comment => "Comment",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::User => "name",
            Self::Post | Self::Comment => "id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRelation(pub String);

impl fmt::Display for UnknownRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown relation '{}'", self.0)
    }
}

impl std::error::Error for UnknownRelation {}

impl FromStr for RelationKind {
    type Err = UnknownRelation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRelation(s.to_string()))
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user lists exposed under `/list/{kind}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Users subscribed to the caller.
    Subscriber,
    /// Users the caller is subscribed to.
    Subscription,
    /// Users the caller blocked.
    Block,
    /// Users waiting for the caller to accept their subscription.
    Request,
}

impl FromStr for ListKind {
    type Err = UnknownRelation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "subscriber" => Ok(Self::Subscriber),
            "subscription" => Ok(Self::Subscription),
            "block" => Ok(Self::Block),
            "request" => Ok(Self::Request),
            _ => Err(UnknownRelation(s.to_string())),
        }
    }
}

/// Outcome of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Created,
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("like".parse::<RelationKind>(), Ok(RelationKind::Like));
        assert_eq!("SUBSCRIBER".parse::<RelationKind>(), Ok(RelationKind::Subscriber));
        assert_eq!("Love".parse::<RelationKind>(), Ok(RelationKind::Love));
        assert!("Create".parse::<RelationKind>().is_err());
        assert!("".parse::<RelationKind>().is_err());
    }

    #[test]
    fn request_is_not_toggleable() {
        let toggleable: Vec<_> = RelationKind::ALL
            .into_iter()
            .filter(|k| k.is_toggleable())
            .collect();
        assert_eq!(toggleable.len(), 5);
        assert!(!toggleable.contains(&RelationKind::Request));
    }

    #[test]
    fn targets_match_labels() {
        assert_eq!(RelationKind::Block.target().label(), "User");
        assert_eq!(RelationKind::Block.target().key(), "name");
        assert_eq!(RelationKind::View.target().label(), "Post");
        assert_eq!(RelationKind::Love.target().label(), "Comment");
        assert_eq!(RelationKind::Love.target().key(), "id");
    }

    #[test]
    fn list_kinds() {
        assert_eq!("Subscription".parse::<ListKind>(), Ok(ListKind::Subscription));
        assert_eq!("REQUEST".parse::<ListKind>(), Ok(ListKind::Request));
        assert!("like".parse::<ListKind>().is_err());
    }
}
