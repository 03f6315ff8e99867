use super::{lenient_i32, season_in_range};
use crate::database::RowSource;
use crate::error::ToolError;
use crate::query::{
    assemble, league_name, run_search, BaseQuery, Column, ColumnExpr, FilterBuilder, OrderBy,
    OutputRecord,
};
use serde::Deserialize;
use tracing::info;

const TEAM_COLUMNS: &[Column] = &[
    Column::new("season_year", "season_year"),
    Column::new("team_code", "team_code"),
    Column::new("league", "league"),
    Column::new("team_location", "team_location"),
    Column::new("team_name", "team_name"),
];

/// Team name alone or prefixed by its location, e.g. "Atlanta Braves".
const TEAM_NAME: &[ColumnExpr] = &[
    ColumnExpr::Column("team_name"),
    ColumnExpr::Concat("team_location", "team_name"),
];

const TEAM_QUERY: BaseQuery = BaseQuery {
    columns: TEAM_COLUMNS,
    from: "team",
    joins: &[],
    order_by: &[OrderBy::desc("season_year"), OrderBy::asc("team_code")],
};

/// Criteria for `find_mlb_baseball_teams`; at least one must be present.
#[derive(Debug, Default, Deserialize)]
pub struct TeamSearch {
    pub team_name: Option<String>,
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub year: Option<i32>,
    pub league: Option<String>,
}

pub async fn find_teams(
    source: &dyn RowSource,
    criteria: TeamSearch,
) -> Result<Vec<OutputRecord>, ToolError> {
    info!(
        "Performing Team Search. TeamName={:?} City={:?} Year={:?} League={:?}",
        criteria.team_name, criteria.city, criteria.year, criteria.league
    );
    if let Some(year) = criteria.year {
        season_in_range(year)?;
    }

    let fragments = FilterBuilder::new()
        .contains(TEAM_NAME, criteria.team_name.as_deref())
        .contains(&[ColumnExpr::Column("team_location")], criteria.city.as_deref())
        .equals_int(ColumnExpr::Column("season_year"), criteria.year)
        .first_letter(ColumnExpr::Column("league"), criteria.league.as_deref())
        .build()?;
    let query = assemble(&TEAM_QUERY, fragments);

    run_search(source, &query, |row| {
        let league = row.get("league")?;
        Ok(OutputRecord::new()
            .field("Season", row.get("season_year")?.to_json())
            .field("Team Code", row.get("team_code")?.to_json())
            .field("League", league_name(&league.to_string()))
            .field("Location", row.get("team_location")?.to_json())
            .field("Name", row.get("team_name")?.to_json()))
    })
    .await
}
