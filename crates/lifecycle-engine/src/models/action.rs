//! 转换动作模型
//!
//! 持久化格式为 `{type, config, order}`，其中 config 是不透明的 JSON 对象。
//! 转换上只保存持久化格式；下发时才解析为按动作类型区分的强类型联合体，
//! 因此无效的动作配置不会影响状态推断。

use lifecycle_shared::error::{LifecycleError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 消息按钮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

/// 发送消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageConfig {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<MessageButton>,
}

fn default_bonus_ttl_hours() -> u32 {
    24
}

/// 发放限时可消耗的赠送额度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBurnableBonusConfig {
    pub amount: i64,
    #[serde(default = "default_bonus_ttl_hours")]
    pub expires_in_hours: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// 给用户打标签
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagUserConfig {
    pub tag: String,
}

/// 发送专属优惠
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSpecialOfferConfig {
    pub offer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// 展示低价引流商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowTripwireConfig {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// 开启邀请奖励
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnableReferralConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_amount: Option<i64>,
}

/// 提示切换模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchModelHintConfig {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// 动作类型与对应配置
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    SendMessage(SendMessageConfig),
    GrantBurnableBonus(GrantBurnableBonusConfig),
    TagUser(TagUserConfig),
    SendSpecialOffer(SendSpecialOfferConfig),
    ShowTripwire(ShowTripwireConfig),
    EnableReferral(EnableReferralConfig),
    SwitchModelHint(SwitchModelHintConfig),
    NoAction,
}

impl ActionKind {
    /// 持久化使用的类型名
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "SEND_MESSAGE",
            Self::GrantBurnableBonus(_) => "GRANT_BURNABLE_BONUS",
            Self::TagUser(_) => "TAG_USER",
            Self::SendSpecialOffer(_) => "SEND_SPECIAL_OFFER",
            Self::ShowTripwire(_) => "SHOW_TRIPWIRE",
            Self::EnableReferral(_) => "ENABLE_REFERRAL",
            Self::SwitchModelHint(_) => "SWITCH_MODEL_HINT",
            Self::NoAction => "NO_ACTION",
        }
    }

    fn config_value(&self) -> Result<Value> {
        let value = match self {
            Self::SendMessage(c) => serde_json::to_value(c)?,
            Self::GrantBurnableBonus(c) => serde_json::to_value(c)?,
            Self::TagUser(c) => serde_json::to_value(c)?,
            Self::SendSpecialOffer(c) => serde_json::to_value(c)?,
            Self::ShowTripwire(c) => serde_json::to_value(c)?,
            Self::EnableReferral(c) => serde_json::to_value(c)?,
            Self::SwitchModelHint(c) => serde_json::to_value(c)?,
            Self::NoAction => Value::Object(Map::new()),
        };
        Ok(value)
    }
}

/// 转换上挂载的动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ActionRecord", into = "ActionRecord")]
pub struct Action {
    pub kind: ActionKind,
    /// 同一转换内的执行顺序，升序
    pub order: i32,
}

impl Action {
    pub fn new(kind: ActionKind, order: i32) -> Self {
        Self { kind, order }
    }
}

/// 动作的持久化格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub order: i32,
}

impl ActionRecord {
    /// 解析为强类型动作
    pub fn to_action(&self) -> Result<Action> {
        Action::try_from(self.clone())
    }
}

impl From<Action> for ActionRecord {
    fn from(action: Action) -> Self {
        // 强类型配置序列化为 JSON 对象不会失败，兜底为空对象
        let config = match action.kind.config_value() {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Self {
            action_type: action.kind.action_type().to_string(),
            config,
            order: action.order,
        }
    }
}

fn parse_config<T: DeserializeOwned>(action_type: &str, config: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(config)).map_err(|e| LifecycleError::InvalidAction {
        action_type: action_type.to_string(),
        reason: e.to_string(),
    })
}

impl TryFrom<ActionRecord> for Action {
    type Error = LifecycleError;

    fn try_from(record: ActionRecord) -> Result<Self> {
        let ActionRecord {
            action_type,
            config,
            order,
        } = record;

        let kind = match action_type.as_str() {
            "SEND_MESSAGE" => ActionKind::SendMessage(parse_config(&action_type, config)?),
            "GRANT_BURNABLE_BONUS" => {
                ActionKind::GrantBurnableBonus(parse_config(&action_type, config)?)
            }
            "TAG_USER" => ActionKind::TagUser(parse_config(&action_type, config)?),
            "SEND_SPECIAL_OFFER" => {
                ActionKind::SendSpecialOffer(parse_config(&action_type, config)?)
            }
            "SHOW_TRIPWIRE" => ActionKind::ShowTripwire(parse_config(&action_type, config)?),
            "ENABLE_REFERRAL" => ActionKind::EnableReferral(parse_config(&action_type, config)?),
            "SWITCH_MODEL_HINT" => {
                ActionKind::SwitchModelHint(parse_config(&action_type, config)?)
            }
            "NO_ACTION" => ActionKind::NoAction,
            _ => {
                return Err(LifecycleError::InvalidAction {
                    action_type,
                    reason: "未知的动作类型".to_string(),
                });
            }
        };

        Ok(Self { kind, order })
    }
}
