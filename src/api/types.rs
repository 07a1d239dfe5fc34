//! Wire formats of the upstream relation API

use follow_graph::{Mid, UserIdentity};
use serde::{Deserialize, Deserializer, Serialize};

/// Application code for success
pub const SUCCESS_CODE: i64 = 0;

/// Application code the upstream uses when it is throttling the caller
pub const RATE_LIMITED_CODE: i64 = -412;

/// Common response envelope `{code, message, data}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// Membership details attached to a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipInfo {
    #[serde(default)]
    pub vip_type: i64,
    #[serde(default)]
    pub vip_status: i64,
}

/// One user entry in a follower, following or common-following list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowItem {
    pub mid: Mid,
    #[serde(default)]
    pub uname: String,
    #[serde(default)]
    pub face: Option<String>,
    #[serde(default)]
    pub vip: Option<VipInfo>,
}

impl FollowItem {
    pub fn is_member(&self) -> bool {
        self.vip.as_ref().is_some_and(|v| v.vip_status == 1)
    }
}

impl From<FollowItem> for UserIdentity {
    fn from(item: FollowItem) -> Self {
        let member = item.is_member();
        UserIdentity {
            mid: item.mid,
            name: item.uname,
            avatar: item.face.filter(|f| !f.is_empty()),
            member,
        }
    }
}

/// `data` of the common-followings endpoint, also the cached payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonFollowingsData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub list: Vec<FollowItem>,
    #[serde(default)]
    pub total: u64,
}

impl CommonFollowingsData {
    pub fn mids(&self) -> Vec<Mid> {
        self.list.iter().map(|item| item.mid).collect()
    }
}

/// `data` of the session endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SessionIdentity {
    #[serde(rename = "isLogin", default)]
    pub is_login: bool,
    #[serde(default)]
    pub mid: Option<Mid>,
    #[serde(default)]
    pub uname: Option<String>,
}

/// The upstream sends `null` instead of `[]` for empty lists
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
