//! CSV formats for voter rolls and generated links.

use std::io::Read;

use log::debug;

use crate::error::{Error, Result};
use crate::model::api::voter::{VoterSpec, VoterUrl};

/// Header of the generated link export.
pub const LINK_EXPORT_HEADERS: [&str; 3] = ["Nombres", "Correo", "URL Generada"];

/// Read a voter roll: one voter per row, name in the first column and email
/// in the second. The first row is a header and is skipped. Rows missing
/// either field are dropped.
pub fn read_roll<R: Read>(input: R) -> Result<Vec<VoterSpec>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut records = reader.into_records();
    _ = records.next();

    let mut voters = Vec::new();
    for (idx, record) in records.enumerate() {
        let record = record?;
        let name = record.get(0).unwrap_or_default();
        let email = record.get(1).unwrap_or_default();
        if name.is_empty() || email.is_empty() {
            // Row 1 is the header.
            debug!("read_roll: dropping incomplete row {}", idx + 2);
            continue;
        }
        voters.push(VoterSpec {
            name: name.to_string(),
            email: email.to_string(),
        });
    }
    Ok(voters)
}

/// Write generated links as CSV, one row per voter.
pub fn write_links(urls: &[VoterUrl]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(LINK_EXPORT_HEADERS)
        .map_err(export_failed)?;
    for url in urls {
        writer
            .write_record([&url.name, &url.email, &url.url])
            .map_err(export_failed)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("Failed to flush CSV export: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("CSV export is not UTF-8: {e}")))
}

/// Writing the export can only fail on our side, unlike reading a roll.
fn export_failed(e: csv::Error) -> Error {
    Error::Internal(format!("Failed to write CSV export: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::http::Status;

    #[test]
    fn skips_header_and_incomplete_rows() {
        let input = "\
nombre,correo
María Pérez,maria@example.org
,nobody@example.org
No Email,
Only One Column
 John Smith , john@example.org
";
        let voters = read_roll(input.as_bytes()).unwrap();
        assert_eq!(
            voters,
            vec![
                VoterSpec::example1(),
                VoterSpec::example2(),
            ]
        );
    }

    #[test]
    fn empty_roll() {
        assert!(read_roll("".as_bytes()).unwrap().is_empty());
        assert!(read_roll("nombre,correo\n".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn link_export_layout() {
        let urls = vec![VoterUrl {
            name: "Jane Doe".to_string(),
            email: "jane@example.org".to_string(),
            url: "https://votes.example.org/voto/a&b".to_string(),
        }];
        let csv = write_links(&urls).unwrap();
        assert_eq!(
            csv,
            "Nombres,Correo,URL Generada\nJane Doe,jane@example.org,https://votes.example.org/voto/a&b\n"
        );
    }

    #[test]
    fn failures_blame_the_right_side() {
        let unreadable = read_roll(&b"Nombres,Correo\n\xff\xfe,bad@example.org\n"[..]).unwrap_err();
        assert_eq!(unreadable.status(), Status::BadRequest);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(export_failed(io.into()).status(), Status::InternalServerError);
    }
}
