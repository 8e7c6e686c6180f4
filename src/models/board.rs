//! Board 数据模型
//!
//! 已知的攀岩板厂商集合，用作限流器和客户端的分区键。

use serde::{Deserialize, Serialize};

/// Board 类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoardType {
    #[serde(rename = "auroraboardapp")]
    AuroraBoardApp,
    #[serde(rename = "decoyboardapp")]
    DecoyBoardApp,
    #[serde(rename = "grasshopperboardapp")]
    GrasshopperBoardApp,
    #[serde(rename = "kilterboardapp")]
    KilterBoardApp,
    #[serde(rename = "moonboard")]
    MoonBoard,
    #[serde(rename = "soillboardapp")]
    SoIllBoardApp,
    #[serde(rename = "tensionboardapp2")]
    TensionBoardApp2,
    #[serde(rename = "touchstoneboardapp")]
    TouchstoneBoardApp,
    #[serde(rename = "12climb")]
    TwelveClimb,
}

/// 厂商协议族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardProtocol {
    /// Aurora 系 REST API（token / bearer 认证）
    Aurora,
    /// Moonboard 表单登录 + Cookie 会话
    MoonboardSession,
    /// 公开 KML 数据源
    Kml,
}

impl BoardType {
    /// 所有已知 board，保持固定顺序
    pub const ALL: [BoardType; 9] = [
        BoardType::AuroraBoardApp,
        BoardType::DecoyBoardApp,
        BoardType::GrasshopperBoardApp,
        BoardType::KilterBoardApp,
        BoardType::MoonBoard,
        BoardType::SoIllBoardApp,
        BoardType::TensionBoardApp2,
        BoardType::TouchstoneBoardApp,
        BoardType::TwelveClimb,
    ];

    /// 线上使用的 key（也是输出文件名）
    pub fn key(&self) -> &'static str {
        match self {
            BoardType::AuroraBoardApp => "auroraboardapp",
            BoardType::DecoyBoardApp => "decoyboardapp",
            BoardType::GrasshopperBoardApp => "grasshopperboardapp",
            BoardType::KilterBoardApp => "kilterboardapp",
            BoardType::MoonBoard => "moonboard",
            BoardType::SoIllBoardApp => "soillboardapp",
            BoardType::TensionBoardApp2 => "tensionboardapp2",
            BoardType::TouchstoneBoardApp => "touchstoneboardapp",
            BoardType::TwelveClimb => "12climb",
        }
    }

    pub fn protocol(&self) -> BoardProtocol {
        match self {
            BoardType::MoonBoard => BoardProtocol::MoonboardSession,
            BoardType::TwelveClimb => BoardProtocol::Kml,
            _ => BoardProtocol::Aurora,
        }
    }

    pub fn is_aurora(&self) -> bool {
        self.protocol() == BoardProtocol::Aurora
    }

    /// 七个 Aurora 协议 board
    pub fn aurora_boards() -> impl Iterator<Item = BoardType> {
        Self::ALL.into_iter().filter(|b| b.is_aurora())
    }

    /// 显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            BoardType::AuroraBoardApp => "Aurora Board",
            BoardType::DecoyBoardApp => "Decoy Board",
            BoardType::GrasshopperBoardApp => "Grasshopper Board",
            BoardType::KilterBoardApp => "Kilter Board",
            BoardType::MoonBoard => "Moon Board",
            BoardType::SoIllBoardApp => "So iLL Board",
            BoardType::TensionBoardApp2 => "Tension Board",
            BoardType::TouchstoneBoardApp => "Touchstone Board",
            BoardType::TwelveClimb => "12Climb Board",
        }
    }

    /// 地图标记颜色
    pub fn color(&self) -> &'static str {
        match self {
            BoardType::AuroraBoardApp => "#B93655",
            BoardType::DecoyBoardApp => "#C256C8",
            BoardType::GrasshopperBoardApp => "#00EAFF",
            BoardType::KilterBoardApp => "#ED1D24",
            BoardType::MoonBoard => "#FEB91E",
            BoardType::SoIllBoardApp => "#8BB297",
            BoardType::TensionBoardApp2 => "#000000",
            BoardType::TouchstoneBoardApp => "#276EAE",
            BoardType::TwelveClimb => "#ED1667",
        }
    }

    /// 厂商 API 源站
    ///
    /// 12climb 没有自己的 API 源站，数据来自 Google My Maps 的 KML 导出。
    pub fn origin(&self) -> String {
        format!("https://{}.com", self.key())
    }
}

impl std::fmt::Display for BoardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for BoardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        BoardType::ALL
            .into_iter()
            .find(|b| b.key() == lower)
            .ok_or_else(|| format!("Invalid board type: {s}"))
    }
}
