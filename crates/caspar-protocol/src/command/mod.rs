//! Typed commands and their wire grammar.
//!
//! A [`Command`] is a tagged union over the shapes a client builds: verbs bound
//! to an [`Allocation`], free-standing elementaries, two-destination swaps,
//! groups sent as one payload, and raw text. Serialisation yields `None` when
//! a required destination is missing, which callers treat as a deliberate
//! no-op.

mod codec;
mod elementary;

use crate::allocation::Allocation;

pub use codec::tokenize;
pub use elementary::{Elementary, interpret};

/// Line terminator used in both directions.
pub const LINE_END: &str = "\r\n";

/// Verbs the client issues itself.
pub mod verbs {
    /// Removes whatever a channel or layer is showing.
    pub const CLEAR: &str = "CLEAR";
    /// Queries server, channel, or layer state.
    pub const INFO: &str = "INFO";
    /// Adjusts layer geometry and compositing.
    pub const MIXER: &str = "MIXER";
    /// Starts playback on a layer.
    pub const PLAY: &str = "PLAY";
    /// Exchanges the contents of two destinations.
    pub const SWAP: &str = "SWAP";
    /// Lists the templates known to the server.
    pub const TLS: &str = "TLS";
}

const SWAP_TRANSFORMS: &str = "TRANSFORMS";

/// Two-destination exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swap {
    /// First destination.
    pub first: Option<Allocation>,
    /// Second destination.
    pub second: Option<Allocation>,
    /// Whether mixer transforms travel with the contents.
    pub transforms: bool,
}

impl Swap {
    /// Swap between two destinations, exchanging transforms as well.
    #[must_use]
    pub const fn new(first: Option<Allocation>, second: Option<Allocation>) -> Self {
        Self {
            first,
            second,
            transforms: true,
        }
    }

    fn arguments(&self) -> Vec<String> {
        let (Some(first), Some(second)) = (self.first, self.second) else {
            return Vec::new();
        };
        let mut args = vec![first.to_string(), second.to_string()];
        if self.transforms {
            args.push(SWAP_TRANSFORMS.to_owned());
        }
        args
    }
}

/// A command in any of its supported shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `<VERB> <allocation>`.
    Simple {
        /// Command verb.
        verb: String,
        /// Destination; the command is a no-op until it is set.
        allocation: Option<Allocation>,
    },
    /// `<VERB> <allocation> <args...>`.
    SimpleWithArgs {
        /// Command verb.
        verb: String,
        /// Destination; the command is a no-op until it is set.
        allocation: Option<Allocation>,
        /// Arguments following the allocation.
        args: Vec<String>,
    },
    /// Free-standing verb and arguments, typically built from parsed text.
    Basic(Elementary),
    /// `SWAP <first> <second> [TRANSFORMS]`.
    Swap(Swap),
    /// Members sent together as one payload.
    Group(Vec<Command>),
    /// Text passed through untouched.
    Raw(String),
}

impl Command {
    /// Unallocated `<VERB> <allocation>` command.
    #[must_use]
    pub fn simple(verb: impl Into<String>) -> Self {
        Self::Simple {
            verb: verb.into(),
            allocation: None,
        }
    }

    /// Unallocated `<VERB> <allocation> <args...>` command.
    #[must_use]
    pub fn simple_with_args<I, A>(verb: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self::SimpleWithArgs {
            verb: verb.into(),
            allocation: None,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Swap that exchanges transforms as well as contents.
    #[must_use]
    pub const fn swap(first: Allocation, second: Allocation) -> Self {
        Self::Swap(Swap::new(Some(first), Some(second)))
    }

    /// Groups commands into one payload.
    #[must_use]
    pub fn group(members: impl IntoIterator<Item = Self>) -> Self {
        Self::Group(members.into_iter().collect())
    }

    /// Builds a command from one line of text.
    ///
    /// # Errors
    ///
    /// Returns the [`SyntaxError`](crate::SyntaxError) raised by
    /// [`Elementary::parse`].
    pub fn parse(text: &str) -> Result<Self, crate::SyntaxError> {
        Elementary::parse(text).map(Self::Basic)
    }

    /// Binds the command to `allocation`.
    ///
    /// Groups pass the allocation on to every member; swaps, elementaries,
    /// and raw text carry their own addressing and are left unchanged.
    pub fn allocate(&mut self, target: Allocation) {
        match self {
            Self::Simple { allocation, .. } | Self::SimpleWithArgs { allocation, .. } => {
                *allocation = Some(target);
            }
            Self::Group(members) => {
                for member in members {
                    member.allocate(target);
                }
            }
            Self::Basic(_) | Self::Swap(_) | Self::Raw(_) => {}
        }
    }

    /// Returns the command bound to `allocation`.
    #[must_use]
    pub fn allocated(mut self, target: Allocation) -> Self {
        self.allocate(target);
        self
    }

    /// Verb of a single-line command.
    #[must_use]
    pub fn verb(&self) -> Option<&str> {
        match self {
            Self::Simple { verb, .. } | Self::SimpleWithArgs { verb, .. } => Some(verb.as_str()),
            Self::Basic(elementary) => Some(elementary.verb()),
            Self::Swap(_) => Some(verbs::SWAP),
            Self::Group(_) | Self::Raw(_) => None,
        }
    }

    /// Arguments of a single-line command, empty when a required destination
    /// is missing. Groups and raw text have no argument list of their own.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        match self {
            Self::Simple { allocation, .. } => {
                allocation.iter().map(ToString::to_string).collect()
            }
            Self::SimpleWithArgs {
                allocation, args, ..
            } => allocation.map_or_else(Vec::new, |target| {
                std::iter::once(target.to_string())
                    .chain(args.iter().cloned())
                    .collect()
            }),
            Self::Basic(elementary) => elementary.args().to_vec(),
            Self::Swap(swap) => swap.arguments(),
            Self::Group(_) | Self::Raw(_) => Vec::new(),
        }
    }

    /// Serialises the command.
    ///
    /// Returns `None` when the command is a no-op: a missing allocation, a
    /// swap lacking either side, an empty group, or empty raw text. Raw text
    /// always ends with [`LINE_END`] so group members never run together.
    #[must_use]
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Self::Simple { verb, .. } | Self::SimpleWithArgs { verb, .. } => {
                let args = self.arguments();
                (!args.is_empty())
                    .then(|| codec::render_line(verb, args.iter().map(String::as_str)))
            }
            Self::Basic(elementary) => Some(elementary.to_wire()),
            Self::Swap(swap) => {
                let args = swap.arguments();
                (!args.is_empty())
                    .then(|| codec::render_line(verbs::SWAP, args.iter().map(String::as_str)))
            }
            Self::Group(members) => {
                let payload: String = members.iter().filter_map(Self::to_wire).collect();
                (!payload.is_empty()).then_some(payload)
            }
            Self::Raw(text) if text.is_empty() => None,
            Self::Raw(text) if text.ends_with(LINE_END) => Some(text.clone()),
            Self::Raw(text) => Some(format!("{text}{LINE_END}")),
        }
    }

    /// Splits the serialised command into the elementaries the server will
    /// answer individually. A no-op yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns a [`SyntaxError`](crate::SyntaxError) when the serialised text
    /// does not parse, for example an invalid verb or malformed raw text.
    pub fn elementaries(&self) -> Result<Vec<Elementary>, crate::SyntaxError> {
        self.to_wire()
            .map_or_else(|| Ok(Vec::new()), |payload| interpret(&payload))
    }
}

impl From<Elementary> for Command {
    fn from(elementary: Elementary) -> Self {
        Self::Basic(elementary)
    }
}

impl From<Swap> for Command {
    fn from(swap: Swap) -> Self {
        Self::Swap(swap)
    }
}

#[cfg(test)]
mod tests;
