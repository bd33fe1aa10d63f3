mod entity;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Entity)] derive macro
// ============================================================================

/// Derive macro for the `Entity` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
/// #[entity(collection = "reservations")]
/// struct Reservation {
///     #[entity(id)]
///     pub id: String,
///     pub court: String,
///     pub date: String,
/// }
/// ```
///
/// - `#[entity(collection = "...")]` sets the collection name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[entity(id)]` marks the `String` field used as the identifier.
///   If omitted, defaults to a field named `id`.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity(input)
}
