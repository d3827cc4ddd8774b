/// Which side of a link a link source selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// `[[page]]`: documents linking to `page`
    Incoming,
    /// `outgoing([[page]])`: documents `page` links to
    Outgoing,
}

/// Boolean combinator for sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOp {
    And,
    Or,
}

/// Document selection, as written after FROM.
///
/// Purely declarative; resolving it to documents is the
/// [corpus](crate::corpus)'s job.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// No FROM clause: every document
    Empty,

    /// `#tag`, also matching nested tags such as `#tag/sub`
    Tag(String),

    /// `"folder"`: documents whose path starts with the folder
    Folder(String),

    /// `[[page]]` or `outgoing([[page]])`
    Link {
        file: String,
        direction: LinkDirection,
    },

    /// `-source` or `!source`
    Negated(Box<Source>),

    /// `a and b`, `a or b`
    Binary {
        left: Box<Source>,
        op: SourceOp,
        right: Box<Source>,
    },
}

impl Source {
    pub fn binary(left: Source, op: SourceOp, right: Source) -> Self {
        Source::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn negate(source: Source) -> Self {
        Source::Negated(Box::new(source))
    }

    /// Combines with OR, treating `Empty` as "nothing written yet".
    pub fn or(self, other: Source) -> Self {
        match self {
            Source::Empty => other,
            existing => Source::binary(existing, SourceOp::Or, other),
        }
    }
}
