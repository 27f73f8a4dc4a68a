//! MCP prompt templates for common stargazing scenarios
//!
//! Prompts guide an assistant through a search with the `analysis_area` tool
//! and through reading its paged results.

use crate::Result;
use serde::Serialize;

/// Prompt descriptor for MCP prompts/list
#[derive(Debug, Serialize)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// Argument definition for prompt templates
#[derive(Debug, Serialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Get all available prompt templates
pub fn list_prompts() -> Result<Vec<PromptDescriptor>> {
    Ok(vec![
        PromptDescriptor {
            name: "dark_sky_search".to_string(),
            description: "Find the darkest reachable stargazing sites in a region".to_string(),
            arguments: Some(vec![
                PromptArgument {
                    name: "bounding_box".to_string(),
                    description: "Region as 'south,west,north,east' in degrees".to_string(),
                    required: true,
                },
                PromptArgument {
                    name: "travel_mode".to_string(),
                    description: "How the observer arrives: drive, walk or bike".to_string(),
                    required: false,
                },
            ]),
        },
        PromptDescriptor {
            name: "site_comparison".to_string(),
            description: "Page through a result set and compare candidate sites".to_string(),
            arguments: Some(vec![
                PromptArgument {
                    name: "bounding_box".to_string(),
                    description: "Region as 'south,west,north,east' in degrees".to_string(),
                    required: true,
                },
                PromptArgument {
                    name: "max_sites".to_string(),
                    description: "How many sites to compare (default 10)".to_string(),
                    required: false,
                },
            ]),
        },
    ])
}

/// Get a specific prompt template by name
pub fn get_prompt(name: &str, arguments: &serde_json::Value) -> Result<String> {
    match name {
        "dark_sky_search" => get_dark_sky_search_prompt(arguments),
        "site_comparison" => get_site_comparison_prompt(arguments),
        _ => Err(crate::Error::not_found("prompt", name)),
    }
}

/// Parse "south,west,north,east" into four numbers.
fn parse_bounding_box(args: &serde_json::Value) -> Result<[f64; 4]> {
    let raw = args["bounding_box"]
        .as_str()
        .ok_or_else(|| crate::Error::invalid_param("bounding_box", "Missing required argument"))?;
    let values: Vec<f64> = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| crate::Error::invalid_param("bounding_box", e.to_string()))?;
    match values.as_slice() {
        [south, west, north, east] => Ok([*south, *west, *north, *east]),
        _ => Err(crate::Error::invalid_param(
            "bounding_box",
            format!("expected 4 comma-separated numbers, got {}", values.len()),
        )),
    }
}

fn get_dark_sky_search_prompt(args: &serde_json::Value) -> Result<String> {
    let [south, west, north, east] = parse_bounding_box(args)?;
    let travel_mode = args["travel_mode"].as_str().unwrap_or("drive");

    let reach = match travel_mode {
        "walk" => "Use network_type \"walk\" with road_radius_km around 1: the observer carries gear on foot.",
        "bike" => "Use network_type \"bike\" with road_radius_km around 3.",
        _ => "Use network_type \"drive\" with road_radius_km around 5 so the site is a short walk from the car.",
    };

    Ok(format!(
        r#"# Dark Sky Search

Find stargazing sites between latitudes {south} and {north} and longitudes {west} and {east}.

## Access
{reach}

## Steps
1. Call the `analysis_area` tool with south={south}, west={west}, north={north}, east={east}
2. Start with min_height_diff 100; if no sites come back, lower it to 50
3. For each site, note:
   - Sky brightness and Bortle class (lower is darker)
   - Terrain relief above the surroundings
   - Distance to the nearest road and its name

## Expected Output
Recommend the best two or three sites with coordinates, and say why each one beats the rest."#,
    ))
}

fn get_site_comparison_prompt(args: &serde_json::Value) -> Result<String> {
    let [south, west, north, east] = parse_bounding_box(args)?;
    let max_sites = args["max_sites"]
        .as_u64()
        .or_else(|| args["max_sites"].as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(10);

    Ok(format!(
        r#"# Site Comparison

Compare up to {max_sites} candidate sites between latitudes {south} and {north} and longitudes {west} and {east}.

## Steps
1. Call `analysis_area` with max_locations={max_sites} and page_size 5
2. While `has_more` is true, request the next page with the same filters; the result set is
   cached, so later pages are consistent with the first
3. Build a table with rank, name, sky quality, Bortle class, relief and road distance
4. Flag sites with unknown sky brightness; they rank below every measured site

## Expected Output
A comparison table followed by a short recommendation."#,
    ))
}
