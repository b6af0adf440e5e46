use std::fmt;

/// Index of a datatype declaration inside a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatatypeId(pub u32);

impl DatatypeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The widest bit-vector a variable may have. Values are stored in a `u64`.
pub const MAX_BV_WIDTH: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    Int,
    Real,
    BitVec(u32),
    Datatype(DatatypeId),
    String,
}

/// The theory responsible for proposing moves on variables of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Theory {
    Bool,
    Arith,
    BitVec,
    Datatype,
    String,
}

impl Sort {
    #[must_use]
    pub const fn theory(&self) -> Theory {
        match self {
            Self::Bool => Theory::Bool,
            Self::Int | Self::Real => Theory::Arith,
            Self::BitVec(_) => Theory::BitVec,
            Self::Datatype(_) => Theory::Datatype,
            Self::String => Theory::String,
        }
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Real)
    }

    #[must_use]
    pub const fn bv_width(&self) -> Option<u32> {
        match self {
            Self::BitVec(w) => Some(*w),
            _ => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "Bool"),
            Self::Int => write!(f, "Int"),
            Self::Real => write!(f, "Real"),
            Self::BitVec(w) => write!(f, "(_ BitVec {w})"),
            Self::Datatype(id) => write!(f, "Datatype#{}", id.0),
            Self::String => write!(f, "String"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub name: String,
    pub fields: Vec<(String, Sort)>,
}

impl ConstructorDecl {
    pub fn new(name: impl Into<String>, fields: Vec<(String, Sort)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    #[must_use]
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(name, _)| name == field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatatypeDecl {
    pub name: String,
    pub constructors: Vec<ConstructorDecl>,
}

impl DatatypeDecl {
    pub fn new(name: impl Into<String>, constructors: Vec<ConstructorDecl>) -> Self {
        Self {
            name: name.into(),
            constructors,
        }
    }

    #[must_use]
    pub fn constructor_index(&self, name: &str) -> Option<usize> {
        self.constructors.iter().position(|c| c.name == name)
    }
}
