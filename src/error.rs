use std::fmt::Display;

use log::{debug, error};
use mongodb::{
    bson::{de::Error as BsonDeError, ser::Error as BsonSerError},
    error::Error as DbError,
};
use rocket::{http::Status, response::Responder, Request};
use thiserror::Error;

use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonSer(#[from] BsonSerError),
    #[error(transparent)]
    BsonDe(#[from] BsonDeError),
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Election {0} is active and can no longer be modified")]
    ElectionActive(Id),
    #[error("Voting is closed: {0}")]
    ElectionClosed(String),
    #[error("Voter {0} has already voted")]
    AlreadyVoted(Id),
    #[error("Election {0} does not accept blank votes")]
    BlankNotAllowed(Id),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn validation(what: impl Display) -> Self {
        Self::Validation(what.to_string())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::BsonSer(_) | Self::BsonDe(_) | Self::Internal(_) => {
                Status::InternalServerError
            }
            Self::Csv(_) | Self::Validation(_) | Self::BlankNotAllowed(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::ElectionActive(_) | Self::AlreadyVoted(_) => Status::Conflict,
            Self::ElectionClosed(_) => Status::Forbidden,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{} {}: {self}", req.method(), req.uri());
        } else {
            debug!("{} {}: {self}", req.method(), req.uri());
        }
        (status, self.to_string()).respond_to(req)
    }
}
