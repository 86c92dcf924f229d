// Query orchestration: build a GridQuery from grid options, hand it to an
// executor and turn the result into page data.

pub mod executor;
pub mod grid;
pub mod seaorm;

pub use executor::{Execution, QueryExecutor};
pub use grid::{Generation, GenerationCounter, Grid, GridLoad, GridOptions, GridPage};
pub use seaorm::SeaOrmExecutor;
