use crate::chat::AGENT_SYSTEM_PROMPT;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

pub struct Tool {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub struct Resource {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

pub struct Prompt {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<PromptArgument>,
}

pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl Tool {
    /// MCP `tools/list` entry.
    pub fn to_mcp(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
            "annotations": {
                "title": self.title,
                "readOnlyHint": true,
                "openWorldHint": true
            }
        })
    }

    /// OpenAI-style function tool definition.
    pub fn to_function(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": format!("{} {}", self.title, self.description),
                "parameters": self.input_schema
            }
        })
    }
}

pub fn find_tool(name: &str) -> Option<&'static Tool> {
    TOOL_REGISTRY.iter().find(|tool| tool.name == name)
}

fn string_property(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn year_property(description: &str) -> Value {
    json!({ "type": "integer", "description": description })
}

pub static TOOL_REGISTRY: Lazy<Vec<Tool>> = Lazy::new(|| {
    vec![
        Tool {
            name: "find_mlb_baseball_teams",
            title: "Search for a Major League Baseball team using the information provided. At least one field must be provided.",
            description: "Gets information about a major league baseball team using the provided search criteria. Returns Season, Team Code, League, Location and Name for each match.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "team_name": string_property("Name of the team (optional)"),
                    "city": string_property("City name / location of the team (optional)"),
                    "year": year_property("Season in which to search for (optional)"),
                    "league": string_property("American or National League (optional)")
                },
                "minProperties": 1
            }),
        },
        Tool {
            name: "search_mlb_rosters",
            title: "Search Major League Baseball rosters for players. At least one field must be provided.",
            description: "Finds players on team rosters. Returns Season, Team, Name, Position, Throwing Hand and Batting Hand for each match.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "team_name": string_property("Team name, with or without its city (optional)"),
                    "year": year_property("Season in which to search for (optional)"),
                    "position": string_property("Fielding position such as P, C, 1B, SS or OF (optional)"),
                    "name": string_property("Player full name or last name (optional)")
                },
                "minProperties": 1
            }),
        },
        Tool {
            name: "search_mlb_games",
            title: "Get game details such as score and number of plays for individual games matching the search parameters.",
            description: "Search for individual Major League Baseball games. No assumptions should be made about the year; do not call the tool when a year cannot be provided. Games are available for the 2001 through 2024 seasons.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": year_property("Season in which to search for (required)"),
                    "team_code_1": string_property("Three letter team code of the first team to match (required)"),
                    "team_code_2": string_property("Three letter team code of the second team to match (optional)")
                },
                "required": ["year", "team_code_1"]
            }),
        },
        Tool {
            name: "get_schedule_and_record",
            title: "Get the schedule and record for a baseball team in a season.",
            description: "Get the schedule and win/loss details for the team identified by the three letter team code (ex. ATL is the Atlanta Braves) in the provided season. Both fields must be provided.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": year_property("Baseball season"),
                    "team_code": string_property("Three letter code for the team")
                },
                "required": ["year", "team_code"]
            }),
        },
        Tool {
            name: "get_current_temperature",
            title: "Get the Current Temperature",
            description: "Gets the current temperature in Fahrenheit for the provided location.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "location": string_property("Location")
                },
                "required": ["location"]
            }),
        },
        Tool {
            name: "get_temperature_on_past_date",
            title: "Lookup a Past Temperature",
            description: "Gets the maximum temperature in Fahrenheit for the provided location on the specified date.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "location": string_property("Location"),
                    "date": string_property("Date in which to pull the weather, e.g. 2025-02-01")
                },
                "required": ["location", "date"]
            }),
        },
        Tool {
            name: "get_current_date_and_time",
            title: "Get the Current Date and Time",
            description: "Gets the current date and time.",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
    ]
});

pub static RESOURCE_REGISTRY: Lazy<Vec<Resource>> = Lazy::new(|| {
    vec![
        Resource {
            uri: "lookup://hand-codes",
            name: "Hand Codes",
            description: "Throwing and batting hand codes used on rosters",
            mime_type: "application/json",
        },
        Resource {
            uri: "lookup://league-codes",
            name: "League Codes",
            description: "League codes used on team records",
            mime_type: "application/json",
        },
    ]
});

pub static PROMPT_REGISTRY: Lazy<Vec<Prompt>> = Lazy::new(|| {
    vec![Prompt {
        name: "baseball_assistant",
        description: "System prompt for the Major League Baseball assistant",
        arguments: vec![PromptArgument {
            name: "question",
            description: "The user's question",
            required: false,
        }],
    }]
});

pub fn prompt_text(question: Option<&str>) -> String {
    match question {
        Some(question) => format!("{}\nQuestion:\n{}", AGENT_SYSTEM_PROMPT, question),
        None => AGENT_SYSTEM_PROMPT.to_string(),
    }
}
