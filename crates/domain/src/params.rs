//! 任务参数模型
//!
//! 参数以带类型标签的标量表示，配合字段级的参数模式（schema）完成
//! 校验与就地类型转换。表单字符串与JSON输入都经由模式驱动的解析
//! 进入同一套转换规则。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use taskforge_errors::{SchedulerError, SchedulerResult};

/// 参数类型，闭合集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskParamType {
    Int,
    Bool,
    String,
    Float,
}

impl fmt::Display for TaskParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::String => write!(f, "string"),
            Self::Float => write!(f, "float"),
        }
    }
}

impl FromStr for TaskParamType {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(Self::Int),
            "bool" => Ok(Self::Bool),
            "string" => Ok(Self::String),
            "float" => Ok(Self::Float),
            other => Err(SchedulerError::unsupported_schema_type(other)),
        }
    }
}

/// 带类型标签的标量参数值
///
/// 序列化为裸JSON标量。反序列化时整数优先于浮点数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl ParamValue {
    /// 值的实际类型
    pub fn param_type(&self) -> TaskParamType {
        match self {
            Self::Int(_) => TaskParamType::Int,
            Self::Float(_) => TaskParamType::Float,
            Self::Bool(_) => TaskParamType::Bool,
            Self::String(_) => TaskParamType::String,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// 任务参数模式：字段名 -> 参数类型
///
/// 注册时设定，之后不可变。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSchema {
    fields: HashMap<String, TaskParamType>,
}

impl TaskSchema {
    pub fn new(fields: HashMap<String, TaskParamType>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// 链式构造
    pub fn with_field(mut self, name: impl Into<String>, param_type: TaskParamType) -> Self {
        self.fields.insert(name.into(), param_type);
        self
    }

    pub fn field(&self, name: &str) -> Option<TaskParamType> {
        self.fields.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, TaskParamType)> {
        self.fields.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// 一次任务调用的参数快照
///
/// 每次运行持有独立的快照，运行之间不共享。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskParams(HashMap<String, ParamValue>);

impl TaskParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// 链式构造
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 取整型值，浮点截断、十进制字符串按转换规则处理
    pub fn get_int(&self, key: &str) -> SchedulerResult<i64> {
        let value = self
            .get(key)
            .ok_or_else(|| SchedulerError::missing_param(key))?;
        coerce_value(key, TaskParamType::Int, value).map(|v| match v {
            ParamValue::Int(i) => i,
            _ => unreachable!("coercion to int always yields Int"),
        })
    }

    /// 取浮点值，整数拓宽、数字字符串按转换规则处理
    pub fn get_float(&self, key: &str) -> SchedulerResult<f64> {
        let value = self
            .get(key)
            .ok_or_else(|| SchedulerError::missing_param(key))?;
        coerce_value(key, TaskParamType::Float, value).map(|v| match v {
            ParamValue::Float(f) => f,
            _ => unreachable!("coercion to float always yields Float"),
        })
    }

    /// 取布尔值，不做跨类型转换
    pub fn get_bool(&self, key: &str) -> SchedulerResult<bool> {
        let value = self
            .get(key)
            .ok_or_else(|| SchedulerError::missing_param(key))?;
        value.as_bool().ok_or_else(|| {
            SchedulerError::type_mismatch(key, "bool", value.param_type().to_string().as_str())
        })
    }

    /// 取字符串值，不做跨类型转换
    pub fn get_string(&self, key: &str) -> SchedulerResult<String> {
        let value = self
            .get(key)
            .ok_or_else(|| SchedulerError::missing_param(key))?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            SchedulerError::type_mismatch(key, "string", value.param_type().to_string().as_str())
        })
    }

    /// 按模式解析表单字段
    ///
    /// 布尔字段采用复选框语义：值为 "on" 时为 true，缺省为 false。
    /// 模式之外的表单字段被忽略（表单可能携带与参数无关的字段）。
    pub fn from_form(
        schema: &TaskSchema,
        values: &HashMap<String, String>,
    ) -> SchedulerResult<Self> {
        let mut params = TaskParams::new();
        for (name, param_type) in schema.fields() {
            match param_type {
                TaskParamType::Bool => {
                    let checked = matches!(values.get(name), Some(v) if v == "on");
                    params.insert(name.clone(), checked);
                }
                TaskParamType::Int => {
                    let raw = values
                        .get(name)
                        .ok_or_else(|| SchedulerError::missing_param(name.clone()))?;
                    let parsed: i64 = raw.parse().map_err(|_| {
                        SchedulerError::type_mismatch(name.as_str(), "int", "string")
                    })?;
                    params.insert(name.clone(), parsed);
                }
                TaskParamType::Float => {
                    let raw = values
                        .get(name)
                        .ok_or_else(|| SchedulerError::missing_param(name.clone()))?;
                    let parsed: f64 = raw.parse().map_err(|_| {
                        SchedulerError::type_mismatch(name.as_str(), "float", "string")
                    })?;
                    params.insert(name.clone(), parsed);
                }
                TaskParamType::String => {
                    let raw = values
                        .get(name)
                        .ok_or_else(|| SchedulerError::missing_param(name.clone()))?;
                    params.insert(name.clone(), raw.clone());
                }
            }
        }
        Ok(params)
    }

    /// 按模式解析解码后的JSON对象，套用与 [`validate_params`] 相同的转换规则
    pub fn from_json(schema: &TaskSchema, value: &serde_json::Value) -> SchedulerResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            SchedulerError::Serialization("参数必须是JSON对象".to_string())
        })?;

        let mut params = TaskParams::new();
        for (name, json_value) in object {
            params
                .0
                .insert(name.clone(), json_to_param(name, json_value)?);
        }
        validate_params(schema, &mut params)?;
        Ok(params)
    }
}

impl From<HashMap<String, ParamValue>> for TaskParams {
    fn from(map: HashMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, ParamValue)> for TaskParams {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for TaskParams {
    type Item = (String, ParamValue);
    type IntoIter = std::collections::hash_map::IntoIter<String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// 校验并就地转换参数
///
/// 模式中每个字段都必须出现在参数中，参数中不得有模式之外的字段；
/// 值按声明类型做转换：整型接受浮点截断与十进制字符串，浮点接受
/// 整数拓宽与数字字符串，布尔与字符串不做跨类型转换。
pub fn validate_params(schema: &TaskSchema, params: &mut TaskParams) -> SchedulerResult<()> {
    for (name, expected) in schema.fields() {
        let value = params
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::missing_param(name.clone()))?;
        let coerced = coerce_value(name, expected, &value)?;
        params.0.insert(name.clone(), coerced);
    }

    for key in params.keys() {
        if !schema.contains(key) {
            return Err(SchedulerError::unexpected_param(key.clone()));
        }
    }

    Ok(())
}

fn coerce_value(
    name: &str,
    expected: TaskParamType,
    value: &ParamValue,
) -> SchedulerResult<ParamValue> {
    let mismatch = || {
        SchedulerError::type_mismatch(
            name,
            expected.to_string().as_str(),
            value.param_type().to_string().as_str(),
        )
    };

    match expected {
        TaskParamType::Int => match value {
            ParamValue::Int(v) => Ok(ParamValue::Int(*v)),
            // 截断（向零取整）
            ParamValue::Float(v) => Ok(ParamValue::Int(v.trunc() as i64)),
            ParamValue::String(s) => s
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| mismatch()),
            ParamValue::Bool(_) => Err(mismatch()),
        },
        TaskParamType::Float => match value {
            ParamValue::Float(v) => Ok(ParamValue::Float(*v)),
            ParamValue::Int(v) => Ok(ParamValue::Float(*v as f64)),
            ParamValue::String(s) => s
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|_| mismatch()),
            ParamValue::Bool(_) => Err(mismatch()),
        },
        TaskParamType::String => match value {
            ParamValue::String(s) => Ok(ParamValue::String(s.clone())),
            _ => Err(mismatch()),
        },
        TaskParamType::Bool => match value {
            ParamValue::Bool(v) => Ok(ParamValue::Bool(*v)),
            _ => Err(mismatch()),
        },
    }
}

fn json_to_param(name: &str, value: &serde_json::Value) -> SchedulerResult<ParamValue> {
    match value {
        serde_json::Value::Bool(b) => Ok(ParamValue::Bool(*b)),
        serde_json::Value::String(s) => Ok(ParamValue::String(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ParamValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(ParamValue::Float(f))
            } else {
                Err(SchedulerError::type_mismatch(name, "number", "number"))
            }
        }
        serde_json::Value::Null => Err(SchedulerError::type_mismatch(name, "scalar", "null")),
        serde_json::Value::Array(_) => Err(SchedulerError::type_mismatch(name, "scalar", "array")),
        serde_json::Value::Object(_) => {
            Err(SchedulerError::type_mismatch(name, "scalar", "object"))
        }
    }
}

/// 从可序列化的结构体派生参数模式
///
/// 字段经serde序列化后映射到参数类型（`#[serde(rename = "...")]` 可
/// 重命名字段）；不支持的字段类型返回 [`SchedulerError::UnsupportedSchemaType`]。
pub fn schema_from_struct<T: Serialize>(value: &T) -> SchedulerResult<TaskSchema> {
    let json = serde_json::to_value(value)?;
    let object = json.as_object().ok_or_else(|| {
        SchedulerError::unsupported_schema_type(json_type_name(&json))
    })?;

    let mut fields = HashMap::new();
    for (name, field) in object {
        let param_type = match field {
            serde_json::Value::Bool(_) => TaskParamType::Bool,
            serde_json::Value::String(_) => TaskParamType::String,
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => TaskParamType::Int,
            serde_json::Value::Number(_) => TaskParamType::Float,
            other => {
                return Err(SchedulerError::unsupported_schema_type(format!(
                    "{name}: {}",
                    json_type_name(other)
                )))
            }
        };
        fields.insert(name.clone(), param_type);
    }
    Ok(TaskSchema::new(fields))
}

/// 从可序列化的结构体构造参数快照，字段映射规则与 [`schema_from_struct`] 一致
pub fn params_from_struct<T: Serialize>(value: &T) -> SchedulerResult<TaskParams> {
    let json = serde_json::to_value(value)?;
    let object = json.as_object().ok_or_else(|| {
        SchedulerError::unsupported_schema_type(json_type_name(&json))
    })?;

    let mut params = TaskParams::new();
    for (name, field) in object {
        match json_to_param(name, field) {
            Ok(v) => params.0.insert(name.clone(), v),
            Err(_) => {
                return Err(SchedulerError::unsupported_schema_type(format!(
                    "{name}: {}",
                    json_type_name(field)
                )))
            }
        };
    }
    Ok(params)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
