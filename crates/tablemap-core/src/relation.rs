//! Relationship descriptors.
//!
//! A [`Relation`] describes a many-to-one link from a child table to a
//! parent table: the child holds `foreign_key`, which points at the
//! parent's `references` column. The reverse direction (one-to-many) uses
//! the same descriptor.

use std::fmt;
use std::sync::Arc;

/// Accessor for the child's parent slot.
pub type ParentSlot<C, P> = fn(&mut C) -> &mut Option<Arc<P>>;

/// Accessor for the parent's children slot.
pub type ChildrenSlot<P, C> = fn(&mut P) -> &mut Vec<C>;

/// A foreign-key link between a child record type `C` and a parent `P`.
pub struct Relation<C, P> {
    /// Name used in logs, e.g. `"author"`.
    pub name: &'static str,
    /// Column on the child table holding the parent key.
    pub foreign_key: &'static str,
    /// Column on the parent table the foreign key points at.
    pub references: &'static str,
    /// Slot on the child where a loaded parent is placed.
    pub parent: ParentSlot<C, P>,
    /// Slot on the parent where loaded children are placed.
    pub children: ChildrenSlot<P, C>,
}

impl<C, P> Relation<C, P> {
    pub const fn new(
        name: &'static str,
        foreign_key: &'static str,
        references: &'static str,
        parent: ParentSlot<C, P>,
        children: ChildrenSlot<P, C>,
    ) -> Self {
        Self {
            name,
            foreign_key,
            references,
            parent,
            children,
        }
    }
}

impl<C, P> Clone for Relation<C, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, P> Copy for Relation<C, P> {}

impl<C, P> fmt::Debug for Relation<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("foreign_key", &self.foreign_key)
            .field("references", &self.references)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Author {
        posts: Vec<Post>,
    }

    #[derive(Default)]
    struct Post {
        author: Option<Arc<Author>>,
    }

    const POST_AUTHOR: Relation<Post, Author> =
        Relation::new("author", "author_id", "id", |p| &mut p.author, |a| &mut a.posts);

    #[test]
    fn slots_reach_the_fields() {
        let mut post = Post::default();
        *(POST_AUTHOR.parent)(&mut post) = Some(Arc::new(Author::default()));
        assert!(post.author.is_some());

        let mut author = Author::default();
        (POST_AUTHOR.children)(&mut author).push(Post::default());
        assert_eq!(author.posts.len(), 1);
        assert_eq!(
            format!("{POST_AUTHOR:?}"),
            "Relation { name: \"author\", foreign_key: \"author_id\", references: \"id\" }"
        );
    }
}
