//! Static authorization policy attached to every signed-in identity.
//! Recomputed on each sign-in, never persisted.

use lazy_static::lazy_static;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionType {
    Catalogue = 0,
    Menu = 1,
    Button = 2,
}

/// Serialized as its numeric discriminant, the form the frontend expects.
impl Serialize for PermissionType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: &'static str,
    pub parent_id: &'static str,
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: PermissionType,
    pub route: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: &'static str,
    pub name: &'static str,
    pub label: &'static str,
    pub status: u8,
    pub order: u32,
    pub desc: &'static str,
    pub permission: Vec<Permission>,
}

fn leaf(
    id: &'static str,
    parent_id: &'static str,
    name: &'static str,
    label: &'static str,
    route: &'static str,
    component: &'static str,
) -> Permission {
    Permission {
        id,
        parent_id,
        name,
        label,
        kind: PermissionType::Menu,
        route,
        order: None,
        icon: None,
        component: Some(component),
        children: Vec::new(),
    }
}

lazy_static! {
    static ref ADMIN_ROLE: Role = Role {
        id: "4281707933534332",
        name: "Admin",
        label: "admin",
        status: 1,
        order: 1,
        desc: "Super Admin",
        permission: vec![
            Permission {
                id: "9100714781927703",
                parent_id: "",
                name: "Dashboard",
                label: "sys.menu.dashboard",
                kind: PermissionType::Catalogue,
                route: "dashboard",
                order: Some(1),
                icon: Some("ic-analysis"),
                component: None,
                children: vec![
                    leaf(
                        "8426999229400979",
                        "9100714781927703",
                        "Workbench",
                        "sys.menu.workbench",
                        "workbench",
                        "/dashboard/workbench/index.tsx",
                    ),
                    leaf(
                        "9710971640510357",
                        "9100714781927703",
                        "Analysis",
                        "sys.menu.analysis",
                        "analysis",
                        "/dashboard/analysis/index.tsx",
                    ),
                ],
            },
            Permission {
                id: "0901673425580518",
                parent_id: "",
                name: "Management",
                label: "sys.menu.management",
                kind: PermissionType::Catalogue,
                route: "management",
                order: Some(2),
                icon: Some("ic-management"),
                component: None,
                children: vec![
                    leaf(
                        "2781684678535711",
                        "0901673425580518",
                        "User",
                        "sys.menu.user.index",
                        "user",
                        "/management/user/index.tsx",
                    ),
                    Permission {
                        kind: PermissionType::Button,
                        ..leaf(
                            "4754063958766648",
                            "2781684678535711",
                            "Account",
                            "sys.menu.user.account",
                            "account",
                            "/management/user/account/index.tsx",
                        )
                    },
                ],
            },
        ],
    };
}

/// Role granted on sign-in. Every account currently receives the admin role.
pub fn role_for(_email: &str) -> Role {
    ADMIN_ROLE.clone()
}
