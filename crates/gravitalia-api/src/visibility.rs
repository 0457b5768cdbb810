use gravitalia_db::{DbError, GraphRepo};
use gravitalia_types::models::Profile;
use gravitalia_types::relation::RelationKind;

/// Whether `viewer` may see `author`'s posts, given the author's profile.
///
/// Suspended authors are hidden from everyone, a block in either
/// direction hides everything, and private authors are only visible to
/// themselves and their subscribers.
pub async fn can_view_profile(
    graph: &dyn GraphRepo,
    viewer: Option<&str>,
    author: &str,
    profile: &Profile,
) -> Result<bool, DbError> {
    if profile.suspended {
        return Ok(false);
    }
    let Some(viewer) = viewer else {
        return Ok(profile.public);
    };
    if viewer == author {
        return Ok(true);
    }
    if graph.blocked_between(viewer, author).await? {
        return Ok(false);
    }
    if profile.public {
        return Ok(true);
    }
    graph
        .relation_exists(viewer, RelationKind::Subscriber, author)
        .await
}

pub async fn can_view(
    graph: &dyn GraphRepo,
    viewer: Option<&str>,
    author: &str,
) -> Result<bool, DbError> {
    match graph.profile(author).await? {
        Some(profile) => can_view_profile(graph, viewer, author, &profile).await,
        None => Ok(false),
    }
}
