//! Output formatting for search results.

use std::io::{self, Write};

use serde::Serialize;
use stargazer_lib::{CandidateLocation, PageResult};

use crate::terminal::ColorPalette;
use crate::OutputFormat;

/// Write one page of results.
pub fn write_page<W: Write>(
    out: &mut W,
    page: &PageResult,
    format: OutputFormat,
    palette: &ColorPalette,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, page),
        OutputFormat::Text => write_page_text(out, page, palette),
    }
}

pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

fn write_page_text<W: Write>(
    out: &mut W,
    page: &PageResult,
    palette: &ColorPalette,
) -> io::Result<()> {
    let ColorPalette {
        reset,
        white_bold,
        gray,
        ..
    } = *palette;

    if page.total == 0 {
        writeln!(out, "No stargazing sites match these filters.")?;
        writeln!(out, "{gray}result set {}{reset}", page.resource_id)?;
        return Ok(());
    }

    writeln!(
        out,
        "{white_bold}{} site(s){reset}, page {} of {} {gray}(result set {}){reset}",
        page.total,
        page.page,
        page.total_pages.max(1),
        page.resource_id
    )?;
    if page.items.is_empty() {
        writeln!(out, "This page is past the end of the result set.")?;
    }
    for item in &page.items {
        write_item(out, item, palette)?;
    }
    if page.has_more {
        writeln!(out, "\n{gray}More results: --page {}{reset}", page.page + 1)?;
    }
    Ok(())
}

fn write_item<W: Write>(
    out: &mut W,
    item: &CandidateLocation,
    palette: &ColorPalette,
) -> io::Result<()> {
    let ColorPalette {
        reset,
        white_bold,
        gray,
        cyan,
        ..
    } = *palette;

    writeln!(
        out,
        "\n{:>3}. {white_bold}{}{reset} {gray}({:.5}, {:.5}){reset}",
        item.rank, item.name, item.lat, item.lon
    )?;
    writeln!(
        out,
        "     elevation {:.0} m, relief +{:.0} m",
        item.elevation, item.height_diff
    )?;

    let road = match &item.road_name {
        Some(name) => format!("{} ({})", name, item.road_type),
        None => item.road_type.clone(),
    };
    writeln!(
        out,
        "     {cyan}{:.2} km{reset} to {}",
        item.distance_to_road_km, road
    )?;

    let sky_color = palette.bortle(item.bortle_class);
    match (item.light_pollution, item.sky_quality, item.bortle_class) {
        (Some(brightness), Some(quality), Some(bortle)) => writeln!(
            out,
            "     sky {sky_color}{:.2} mag/arcsec², Bortle {}{reset} {gray}({:.3} mcd/m²){reset}",
            quality, bortle, brightness
        ),
        _ => writeln!(out, "     sky {sky_color}brightness unknown{reset}"),
    }
}
