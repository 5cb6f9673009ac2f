use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};

use crate::error::Error;
use crate::model::mongodb::Id;

/// Joins the election and voter IDs in a voter link.
pub const LINK_SEPARATOR: &str = "&";
/// The separator as it arrives when the link has been percent-encoded.
pub const ENCODED_LINK_SEPARATOR: &str = "%26";

/// The identifying part of a voter's personal link: `<electionId>&<voterId>`.
///
/// Links already handed out to voters depend on this exact layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoterLink {
    pub election_id: Id,
    pub voter_id: Id,
}

impl VoterLink {
    pub fn new(election_id: Id, voter_id: Id) -> Self {
        Self {
            election_id,
            voter_id,
        }
    }

    /// The full link: `<site>/voto/<electionId>&<voterId>`.
    pub fn url(&self, site_url: &str) -> String {
        format!("{}/voto/{self}", site_url.trim_end_matches('/'))
    }
}

impl Display for VoterLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{LINK_SEPARATOR}{}", self.election_id, self.voter_id)
    }
}

impl FromStr for VoterLink {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (election, voter) = s
            .split_once(ENCODED_LINK_SEPARATOR)
            .or_else(|| s.split_once(LINK_SEPARATOR))
            .ok_or_else(|| Error::validation(format!("Malformed voter link '{s}'")))?;
        let parse = |part: &str| {
            part.parse::<Id>()
                .map_err(|_| Error::validation(format!("Malformed voter link '{s}'")))
        };
        Ok(Self::new(parse(election)?, parse(voter)?))
    }
}

impl<'a> FromParam<'a> for VoterLink {
    type Error = Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for VoterLink {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] VoterLink);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_layout() {
        let link = VoterLink::new(Id::new(), Id::new());
        assert_eq!(
            link.url("https://votes.example.org/"),
            format!(
                "https://votes.example.org/voto/{}&{}",
                link.election_id, link.voter_id
            )
        );
    }

    #[test]
    fn parses_both_separators() {
        let link = VoterLink::new(Id::new(), Id::new());
        let literal = format!("{}&{}", link.election_id, link.voter_id);
        let encoded = format!("{}%26{}", link.election_id, link.voter_id);
        assert_eq!(literal.parse::<VoterLink>().unwrap(), link);
        assert_eq!(encoded.parse::<VoterLink>().unwrap(), link);
        assert_eq!(link.to_string().parse::<VoterLink>().unwrap(), link);
    }

    #[test]
    fn rejects_malformed() {
        let id = Id::new();
        assert!(id.to_string().parse::<VoterLink>().is_err());
        assert!(format!("{id}&nope").parse::<VoterLink>().is_err());
        assert!(format!("{id}&{id}&{id}").parse::<VoterLink>().is_err());
    }
}
