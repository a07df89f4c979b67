use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub name: String,
    pub location: String,
    pub profession: String,
    pub age: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expertise {
    pub areas: Vec<String>,
    pub level: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub collaboration_style: String,
    #[serde(default)]
    pub communication_preferences: Vec<String>,
    pub work_environment: String,
}

/// A user profile as indexed in the `users` collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub basic_info: BasicInfo,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
    pub expertise: Expertise,
    pub preferences: Preferences,
    #[serde(default)]
    pub activities: Vec<String>,
}

impl User {
    /// Natural-language description of the profile that gets embedded.
    pub fn profile_text(&self) -> String {
        format!(
            "{} interested in {}. Values include {}. Expert in {}. Prefers {} collaboration style.",
            self.basic_info.profession,
            self.interests.join(", "),
            self.values.join(", "),
            self.expertise.areas.join(", "),
            self.preferences.collaboration_style,
        )
    }
}

/// Bootstrap file layout: `{"users": [...]}`.
#[derive(Debug, Deserialize)]
pub struct UserSeed {
    pub users: Vec<User>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserMatch {
    pub user: User,
    /// Similarity in `[0, 1]`, higher is better.
    pub compatibility_score: f32,
    pub similarity_percent: f32,
    pub match_reasons: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserMatchResponse {
    pub matches: Vec<UserMatch>,
    pub query_understanding: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}
