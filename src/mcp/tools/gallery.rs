//! Gallery still and PowerGrade album tools.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::outcome;
use crate::api::{Gallery, StillAlbum};
use crate::connection::Connection;
use crate::error::{ResolveError, Result};
use crate::guard::{rule, validate_params, with_project, Constraint, ParamRule};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AlbumNameInput {
    /// Still album name as listed by get_gallery_still_albums.
    pub album_name: String,
}

const ALBUM_RULES: [ParamRule; 1] = [rule("album_name", Constraint::NonEmpty)];

/// A gallery album and the number of stills it holds.
#[derive(Debug, Serialize, PartialEq)]
pub struct AlbumSummary {
    pub name: String,
    pub still_count: usize,
}

fn summarize(gallery: &dyn Gallery, albums: &[Arc<dyn StillAlbum>]) -> Result<Vec<AlbumSummary>> {
    albums
        .iter()
        .map(|album| {
            Ok(AlbumSummary {
                name: gallery.album_name(album.as_ref())?,
                still_count: album.still_count()?,
            })
        })
        .collect()
}

pub fn get_gallery_still_albums(conn: &Connection) -> Result<Vec<AlbumSummary>> {
    with_project(conn, |cx| {
        let gallery = cx.conn.gallery()?;
        summarize(gallery.as_ref(), &gallery.still_albums()?)
    })
}

pub fn get_power_grade_albums(conn: &Connection) -> Result<Vec<AlbumSummary>> {
    with_project(conn, |cx| {
        let gallery = cx.conn.gallery()?;
        summarize(gallery.as_ref(), &gallery.power_grade_albums()?)
    })
}

pub fn get_current_still_album(conn: &Connection) -> Result<AlbumSummary> {
    with_project(conn, |cx| {
        let gallery = cx.conn.gallery()?;
        let album = gallery
            .current_still_album()?
            .ok_or_else(|| ResolveError::not_found("Still album", "current"))?;
        Ok(AlbumSummary {
            name: gallery.album_name(album.as_ref())?,
            still_count: album.still_count()?,
        })
    })
}

pub fn set_current_still_album(conn: &Connection, input: AlbumNameInput) -> Result<String> {
    validate_params(&input, &ALBUM_RULES)?;
    with_project(conn, |cx| {
        let gallery = cx.conn.gallery()?;
        let mut target = None;
        for album in gallery.still_albums()? {
            if gallery.album_name(album.as_ref())? == input.album_name {
                target = Some(album);
                break;
            }
        }
        let album = target.ok_or_else(|| ResolveError::not_found("Album", &input.album_name))?;
        let set = gallery.set_current_still_album(album.as_ref())?;
        Ok(outcome(
            set,
            format!("Successfully set current still album to '{}'", input.album_name),
            "Failed to set current still album",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryConnector, MemoryResolve};

    fn albums(names: &[(&str, usize)]) -> Vec<AlbumSummary> {
        names
            .iter()
            .map(|(name, count)| AlbumSummary { name: name.to_string(), still_count: *count })
            .collect()
    }

    #[test]
    fn test_list_albums() {
        let app = MemoryResolve::with_project("Grade");
        let gallery = app.current_memory_project().unwrap().memory_gallery();
        gallery.add_still_album("Look Dev").add_still();
        let conn = Connection::open(Arc::new(MemoryConnector::new(app)));

        assert_eq!(
            get_gallery_still_albums(&conn).unwrap(),
            albums(&[("Stills 1", 0), ("Look Dev", 1)])
        );
        assert_eq!(get_power_grade_albums(&conn).unwrap(), albums(&[("PowerGrade 1", 0)]));
    }

    #[test]
    fn test_switch_current_album() {
        let app = MemoryResolve::with_project("Grade");
        app.current_memory_project().unwrap().memory_gallery().add_still_album("Look Dev");
        let conn = Connection::open(Arc::new(MemoryConnector::new(app)));

        assert_eq!(get_current_still_album(&conn).unwrap().name, "Stills 1");
        let msg =
            set_current_still_album(&conn, AlbumNameInput { album_name: "Look Dev".into() })
                .unwrap();
        assert_eq!(msg, "Successfully set current still album to 'Look Dev'");
        assert_eq!(get_current_still_album(&conn).unwrap().name, "Look Dev");

        let err = set_current_still_album(&conn, AlbumNameInput { album_name: "Day 3".into() })
            .unwrap_err();
        assert_eq!(err.to_string(), "Album 'Day 3' not found");
    }

    #[test]
    fn test_gallery_needs_project() {
        let conn = Connection::open(Arc::new(MemoryConnector::new(MemoryResolve::new())));
        assert_eq!(get_gallery_still_albums(&conn).unwrap_err(), ResolveError::NoProject);
    }
}
