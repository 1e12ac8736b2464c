use crate::provider::AccountType;
use crate::storage::{Account, AccountId};

/// Icon key views show while an avatar is still loading.
pub const PLACEHOLDER_ICON: &str = "icon:hourglass";

pub const COLUMN_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Default,
    Name,
    Type,
}

impl Column {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Column::Default),
            1 => Some(Column::Name),
            2 => Some(Column::Type),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// What a view is asking a cell for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Display,
    Decoration,
    CheckState,
    Placeholder,
    /// The item itself rather than a rendering of it.
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellData {
    Empty,
    Text(String),
    Icon(String),
    Checked(bool),
    Account(AccountId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags {
    pub checkable: bool,
    pub enabled: bool,
    pub selectable: bool,
}

impl ItemFlags {
    pub const NONE: ItemFlags = ItemFlags {
        checkable: false,
        enabled: false,
        selectable: false,
    };

    pub const ROW: ItemFlags = ItemFlags {
        checkable: true,
        enabled: true,
        selectable: true,
    };
}

pub fn header_data(column: Column, role: Role) -> CellData {
    if role != Role::Display {
        return CellData::Empty;
    }
    let label = match column {
        Column::Default => "Default",
        Column::Name => "Username",
        Column::Type => "Type",
    };
    CellData::Text(label.to_string())
}

/// Resolves one cell of the account table.
pub fn cell_data(
    account: &Account,
    account_type: Option<&dyn AccountType>,
    is_default: bool,
    column: Column,
    role: Role,
) -> CellData {
    if role == Role::User {
        return CellData::Account(account.id());
    }
    match (column, role) {
        (Column::Default, Role::CheckState) => CellData::Checked(is_default),
        (Column::Name, Role::Display) => CellData::Text(account.display_name().to_string()),
        (Column::Name, Role::Decoration) => match account.display_avatar() {
            Some(avatar) => CellData::Icon(avatar.to_string()),
            None => CellData::Empty,
        },
        (Column::Type, Role::Display) => match account_type {
            Some(ty) => CellData::Text(ty.text().to_string()),
            None => CellData::Text(account.account_type().to_string()),
        },
        (Column::Type, Role::Decoration) => match account_type {
            Some(ty) => CellData::Icon(ty.icon().to_string()),
            None => CellData::Empty,
        },
        (Column::Name | Column::Type, Role::Placeholder) => CellData::Icon(PLACEHOLDER_ICON.to_string()),
        _ => CellData::Empty,
    }
}
