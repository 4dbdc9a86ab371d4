//! Client-side reconciliation for Noughts.
//!
//! A [`ClientView`] mirrors one game from the point of view of a single
//! connection. It only ever changes in response to server events, and it
//! answers one question for the UI: may this click be sent as a move?
//!
//! ```ignore
//! let mut view = ClientView::new(game_id);
//! send(view.join_request());
//! while let Some(envelope) = next_frame() {
//!     view.apply(&envelope.event);
//!     render(view.board(), &view.status());
//! }
//! ```
//!
//! The gate in [`ClientView::request_move`] is a convenience. The server
//! revalidates every move independently.

mod error;
mod view;

pub use error::MoveBlocked;
pub use view::{ClientPhase, ClientView, Rejection};
