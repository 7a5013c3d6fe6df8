//! Comment forest assembly
//!
//! Rebuilds the reply tree from a flat comment set with a parent→children
//! index and sorts every level with the same order. Sorting is stable, so
//! ties keep the order the comments were supplied in. Parent references are
//! not validated here; a comment whose parent is absent from the input is
//! unreachable from any root and is left out.

use crate::db::schemas::CommentDoc;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Ordering applied at every level of the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentSort {
    /// Newest first
    New,
    /// Most upvotes first (raw count, not net)
    #[default]
    Top,
    /// Most total engagement first (upvotes + downvotes)
    Controversial,
}

impl CommentSort {
    /// Parse a query value; anything unknown falls back to `Top`
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("new") => Self::New,
            Some("controversial") => Self::Controversial,
            _ => Self::Top,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Top => "top",
            Self::Controversial => "controversial",
        }
    }

    fn sort(&self, nodes: &mut [CommentNode]) {
        match self {
            Self::New => nodes.sort_by_key(|n| Reverse(n.comment.created_at)),
            Self::Top => nodes.sort_by_key(|n| Reverse(n.comment.upvotes)),
            Self::Controversial => {
                nodes.sort_by_key(|n| Reverse(n.comment.upvotes + n.comment.downvotes))
            }
        }
    }
}

/// A comment with its nested replies
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentDoc,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, including this one
    pub fn size(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::size).sum::<usize>()
    }
}

/// Build the sorted comment forest
pub fn thread(comments: Vec<CommentDoc>, sort: CommentSort) -> Vec<CommentNode> {
    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<CommentDoc>> = HashMap::new();

    for comment in comments {
        match comment.parent_id.clone() {
            Some(parent) => children.entry(parent).or_default().push(comment),
            None => roots.push(comment),
        }
    }

    let mut forest: Vec<CommentNode> = roots
        .into_iter()
        .map(|root| attach(root, &mut children, sort))
        .collect();
    sort.sort(&mut forest);
    forest
}

fn attach(
    comment: CommentDoc,
    children: &mut HashMap<String, Vec<CommentDoc>>,
    sort: CommentSort,
) -> CommentNode {
    // Taking the bucket guarantees each comment is placed at most once,
    // even if the input contains a parent cycle
    let direct = children.remove(&comment.id).unwrap_or_default();
    let mut replies: Vec<CommentNode> = direct
        .into_iter()
        .map(|child| attach(child, children, sort))
        .collect();
    sort.sort(&mut replies);

    CommentNode { comment, replies }
}

/// Total comments in a forest
pub fn forest_size(forest: &[CommentNode]) -> usize {
    forest.iter().map(CommentNode::size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, parent: Option<&str>, upvotes: i64, downvotes: i64, created_at: i64) -> CommentDoc {
        CommentDoc {
            id: id.to_string(),
            post_id: "p1".to_string(),
            parent_id: parent.map(str::to_string),
            author_id: "a1".to_string(),
            author_name: "봇".to_string(),
            content: format!("댓글 {}", id),
            upvotes,
            downvotes,
            created_at,
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.comment.id.as_str()).collect()
    }

    fn sample() -> Vec<CommentDoc> {
        vec![
            comment("r1", None, 1, 9, 10),
            comment("r2", None, 5, 0, 20),
            comment("c1", Some("r1"), 0, 0, 30),
            comment("c2", Some("r1"), 3, 0, 40),
            comment("g1", Some("c2"), 0, 0, 50),
            comment("r3", None, 2, 1, 60),
        ]
    }

    fn check_parentage(nodes: &[CommentNode], parent: Option<&str>) {
        for node in nodes {
            assert_eq!(node.comment.parent_id.as_deref(), parent);
            check_parentage(&node.replies, Some(&node.comment.id));
        }
    }

    #[test]
    fn test_forest_preserves_every_comment() {
        let forest = thread(sample(), CommentSort::Top);
        assert_eq!(forest_size(&forest), 6);
        check_parentage(&forest, None);
    }

    #[test]
    fn test_top_sorts_every_level() {
        let forest = thread(sample(), CommentSort::Top);
        assert_eq!(ids(&forest), vec!["r2", "r3", "r1"]);

        let r1 = &forest[2];
        assert_eq!(ids(&r1.replies), vec!["c2", "c1"]);
        assert_eq!(ids(&r1.replies[0].replies), vec!["g1"]);
    }

    #[test]
    fn test_new_sorts_by_created_desc() {
        let forest = thread(sample(), CommentSort::New);
        assert_eq!(ids(&forest), vec!["r3", "r2", "r1"]);
        assert_eq!(ids(&forest[2].replies), vec!["c2", "c1"]);
    }

    #[test]
    fn test_controversial_is_total_engagement() {
        let forest = thread(sample(), CommentSort::Controversial);
        // r1: 10, r2: 5, r3: 3
        assert_eq!(ids(&forest), vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let comments = vec![
            comment("b", None, 1, 0, 5),
            comment("a", None, 1, 0, 5),
            comment("c", None, 1, 0, 5),
        ];
        let forest = thread(comments, CommentSort::Top);
        assert_eq!(ids(&forest), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_orphans_are_dropped() {
        let comments = vec![comment("r1", None, 0, 0, 1), comment("o1", Some("gone"), 0, 0, 2)];
        let forest = thread(comments, CommentSort::Top);
        assert_eq!(forest_size(&forest), 1);
    }

    #[test]
    fn test_parse_sort() {
        assert_eq!(CommentSort::parse(Some("new")), CommentSort::New);
        assert_eq!(CommentSort::parse(Some("controversial")), CommentSort::Controversial);
        assert_eq!(CommentSort::parse(Some("hot")), CommentSort::Top);
        assert_eq!(CommentSort::parse(None), CommentSort::Top);
    }

    #[test]
    fn test_node_serializes_flat() {
        let forest = thread(vec![comment("r1", None, 0, 0, 1)], CommentSort::Top);
        let json = serde_json::to_value(&forest[0]).unwrap();
        assert_eq!(json["id"], "r1");
        assert!(json["replies"].as_array().unwrap().is_empty());
    }
}
