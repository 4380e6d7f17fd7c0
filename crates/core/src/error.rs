use thiserror::Error;

use crate::model::{CatalogError, ParseIdError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
