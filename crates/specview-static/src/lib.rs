//! Fixture-rendered pages for the SpecView engine.
//!
//! A [`PageFixture`] describes plain markup plus a component tree. Rendering
//! it yields a [`StaticPage`] whose structural queries run through the
//! `scraper` CSS engine and whose instance graph mirrors the component tree.

pub mod error;
pub mod fixture;
pub mod page;
pub mod render;

pub use error::FixtureError;
pub use fixture::{ComponentKind, ComponentNode, ElementNode, FixtureNode, PageFixture, PortalNode};
pub use page::StaticPage;
pub use render::NODE_ATTR;
