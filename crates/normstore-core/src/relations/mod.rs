//! Relation descriptors and their loaders
//!
//! Relations are a closed set of kinds. Each kind carries its join keys and
//! resolves through the same [`RelationResolver`] capability; nothing in the
//! engine inspects records to guess what a relation is.

mod load;

pub use load::RelationResolver;

/// Relation declared on a model field
///
/// Join keys name plain attributes. "Owner-side" kinds (`BelongsTo`,
/// `HasManyBy`, `MorphTo`) keep the foreign key on the declaring record;
/// the other kinds keep it on the related record or in a pivot entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// One related record whose `foreign_key` equals this record's `local_key`
    HasOne {
        related: String,
        foreign_key: String,
        local_key: String,
    },
    /// The parent record whose `owner_key` equals this record's `foreign_key`
    BelongsTo {
        parent: String,
        foreign_key: String,
        owner_key: String,
    },
    /// Every related record whose `foreign_key` equals this record's `local_key`
    HasMany {
        related: String,
        foreign_key: String,
        local_key: String,
    },
    /// Parents listed by key in this record's array field `foreign_key`
    HasManyBy {
        parent: String,
        foreign_key: String,
        owner_key: String,
    },
    /// Related records joined through a pivot entity
    BelongsToMany {
        related: String,
        pivot: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        parent_key: String,
        related_key: String,
    },
    /// Owner of a polymorphic child, addressed by `(kind, id)` fields
    MorphTo { id: String, kind: String },
    /// One polymorphic child pointing back at this record
    MorphOne {
        related: String,
        id: String,
        kind: String,
        local_key: String,
    },
    /// Every polymorphic child pointing back at this record
    MorphMany {
        related: String,
        id: String,
        kind: String,
        local_key: String,
    },
}

impl Relation {
    pub fn has_one(related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::HasOne {
            related: related.into(),
            foreign_key: foreign_key.into(),
            local_key: "id".to_string(),
        }
    }

    pub fn belongs_to(parent: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::BelongsTo {
            parent: parent.into(),
            foreign_key: foreign_key.into(),
            owner_key: "id".to_string(),
        }
    }

    pub fn has_many(related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::HasMany {
            related: related.into(),
            foreign_key: foreign_key.into(),
            local_key: "id".to_string(),
        }
    }

    pub fn has_many_by(parent: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::HasManyBy {
            parent: parent.into(),
            foreign_key: foreign_key.into(),
            owner_key: "id".to_string(),
        }
    }

    pub fn belongs_to_many(
        related: impl Into<String>,
        pivot: impl Into<String>,
        foreign_pivot_key: impl Into<String>,
        related_pivot_key: impl Into<String>,
    ) -> Self {
        Relation::BelongsToMany {
            related: related.into(),
            pivot: pivot.into(),
            foreign_pivot_key: foreign_pivot_key.into(),
            related_pivot_key: related_pivot_key.into(),
            parent_key: "id".to_string(),
            related_key: "id".to_string(),
        }
    }

    pub fn morph_to(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Relation::MorphTo {
            id: id.into(),
            kind: kind.into(),
        }
    }

    pub fn morph_one(
        related: impl Into<String>,
        id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Relation::MorphOne {
            related: related.into(),
            id: id.into(),
            kind: kind.into(),
            local_key: "id".to_string(),
        }
    }

    pub fn morph_many(
        related: impl Into<String>,
        id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Relation::MorphMany {
            related: related.into(),
            id: id.into(),
            kind: kind.into(),
            local_key: "id".to_string(),
        }
    }

    /// Override the key on the declaring record (`local_key`/`parent_key`)
    /// or on the parent (`owner_key`), depending on the kind
    pub fn with_local_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        match &mut self {
            Relation::HasOne { local_key, .. }
            | Relation::HasMany { local_key, .. }
            | Relation::MorphOne { local_key, .. }
            | Relation::MorphMany { local_key, .. } => *local_key = key,
            Relation::BelongsTo { owner_key, .. } | Relation::HasManyBy { owner_key, .. } => {
                *owner_key = key
            }
            Relation::BelongsToMany { parent_key, .. } => *parent_key = key,
            Relation::MorphTo { .. } => {}
        }
        self
    }

    /// Whether the loaded value is an array rather than a single record
    pub fn is_many(&self) -> bool {
        matches!(
            self,
            Relation::HasMany { .. }
                | Relation::HasManyBy { .. }
                | Relation::BelongsToMany { .. }
                | Relation::MorphMany { .. }
        )
    }

    /// Foreign key lives on the declaring record
    pub fn is_owner_side(&self) -> bool {
        matches!(
            self,
            Relation::BelongsTo { .. } | Relation::HasManyBy { .. } | Relation::MorphTo { .. }
        )
    }

    /// Entities this relation reads, for registry validation
    ///
    /// `MorphTo` targets are only known per record and are not listed.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Relation::HasOne { related, .. }
            | Relation::HasMany { related, .. }
            | Relation::MorphOne { related, .. }
            | Relation::MorphMany { related, .. } => vec![related.as_str()],
            Relation::BelongsTo { parent, .. } | Relation::HasManyBy { parent, .. } => {
                vec![parent.as_str()]
            }
            Relation::BelongsToMany { related, pivot, .. } => {
                vec![related.as_str(), pivot.as_str()]
            }
            Relation::MorphTo { .. } => Vec::new(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Relation::HasOne { .. } => "has_one",
            Relation::BelongsTo { .. } => "belongs_to",
            Relation::HasMany { .. } => "has_many",
            Relation::HasManyBy { .. } => "has_many_by",
            Relation::BelongsToMany { .. } => "belongs_to_many",
            Relation::MorphTo { .. } => "morph_to",
            Relation::MorphOne { .. } => "morph_one",
            Relation::MorphMany { .. } => "morph_many",
        }
    }
}
