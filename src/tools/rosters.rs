use super::{lenient_i32, season_in_range};
use crate::database::RowSource;
use crate::error::ToolError;
use crate::query::{
    assemble, compose_name, hand_description, run_search, BaseQuery, Column, ColumnExpr,
    FilterBuilder, OrderBy, OutputRecord,
};
use serde::Deserialize;
use tracing::info;

const ROSTER_COLUMNS: &[Column] = &[
    Column::new("season_year", "roster.season_year"),
    Column::new("team_location", "team.team_location"),
    Column::new("team_name", "team.team_name"),
    Column::new("first_name", "player.first_name"),
    Column::new("last_name", "player.last_name"),
    Column::new("position", "roster.position"),
    Column::new("throw_hand", "player.throw_hand"),
    Column::new("bat_hand", "player.bat_hand"),
];

const ROSTER_QUERY: BaseQuery = BaseQuery {
    columns: ROSTER_COLUMNS,
    from: "roster, player, team",
    joins: &[
        "roster.player_id = player.player_id",
        "roster.team_code = team.team_code",
        "roster.season_year = team.season_year",
    ],
    order_by: &[
        OrderBy::desc("roster.season_year"),
        OrderBy::asc("player.last_name"),
        OrderBy::asc("player.first_name"),
    ],
};

/// Criteria for `search_mlb_rosters`; at least one must be present.
#[derive(Debug, Default, Deserialize)]
pub struct RosterSearch {
    pub team_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub year: Option<i32>,
    pub position: Option<String>,
    pub name: Option<String>,
}

pub async fn search_rosters(
    source: &dyn RowSource,
    criteria: RosterSearch,
) -> Result<Vec<OutputRecord>, ToolError> {
    info!(
        "Performing Roster Search. TeamName={:?} Year={:?} Position={:?} Name={:?}",
        criteria.team_name, criteria.year, criteria.position, criteria.name
    );
    if let Some(year) = criteria.year {
        season_in_range(year)?;
    }

    let fragments = FilterBuilder::new()
        .contains(
            &[
                ColumnExpr::Column("team.team_name"),
                ColumnExpr::Concat("team.team_location", "team.team_name"),
            ],
            criteria.team_name.as_deref(),
        )
        .equals_int(ColumnExpr::Column("roster.season_year"), criteria.year)
        .equals_ignore_case(
            ColumnExpr::Column("roster.position"),
            criteria.position.as_deref(),
        )
        .contains(
            &[
                ColumnExpr::Concat("player.first_name", "player.last_name"),
                ColumnExpr::Column("player.last_name"),
            ],
            criteria.name.as_deref(),
        )
        .build()?;
    let query = assemble(&ROSTER_QUERY, fragments);

    run_search(source, &query, |row| {
        Ok(OutputRecord::new()
            .field("Season", row.get("season_year")?.to_json())
            .field(
                "Team",
                compose_name(row.get("team_location")?, row.get("team_name")?),
            )
            .field(
                "Name",
                compose_name(row.get("first_name")?, row.get("last_name")?),
            )
            .field("Position", row.get("position")?.to_json())
            .field(
                "Throwing Hand",
                hand_description(row.get("throw_hand")?.as_str()),
            )
            .field(
                "Batting Hand",
                hand_description(row.get("bat_hand")?.as_str()),
            ))
    })
    .await
}
