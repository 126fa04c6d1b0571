pub mod detect;
pub mod nicknames;

pub use detect::detect_sport;
pub use nicknames::{expand_nickname, strip_affixes, team_nickname};
