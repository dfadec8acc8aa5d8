//! Collection names and well-known record names.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    DzitraUser,
    DzitraRole,
    DzitraUserRole,
    User,
    Role,
    UserCredential,
    UserRole,
    Newsletter,
    Lead,
    LeadType,
    LeadStatus,
    LeadOwner,
    UserType,
    IndustryType,
    Region,
    Plan,
    PlanType,
    Subscription,
    Customer,
    EmailTemplate,
    Smtp,
    General,
    CompanySetting,
    CompanyFormatSetting,
    CompanyWorkSetting,
    CompanyHoliday,
}

impl Collection {
    pub const ALL: [Collection; 26] = [
        Collection::DzitraUser,
        Collection::DzitraRole,
        Collection::DzitraUserRole,
        Collection::User,
        Collection::Role,
        Collection::UserCredential,
        Collection::UserRole,
        Collection::Newsletter,
        Collection::Lead,
        Collection::LeadType,
        Collection::LeadStatus,
        Collection::LeadOwner,
        Collection::UserType,
        Collection::IndustryType,
        Collection::Region,
        Collection::Plan,
        Collection::PlanType,
        Collection::Subscription,
        Collection::Customer,
        Collection::EmailTemplate,
        Collection::Smtp,
        Collection::General,
        Collection::CompanySetting,
        Collection::CompanyFormatSetting,
        Collection::CompanyWorkSetting,
        Collection::CompanyHoliday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::DzitraUser => "dzitrauser",
            Collection::DzitraRole => "dzitrarole",
            Collection::DzitraUserRole => "dzitrauserrole",
            Collection::User => "user",
            Collection::Role => "role",
            Collection::UserCredential => "usercredential",
            Collection::UserRole => "userrole",
            Collection::Newsletter => "newsletter",
            Collection::Lead => "lead",
            Collection::LeadType => "leadtype",
            Collection::LeadStatus => "leadstatus",
            Collection::LeadOwner => "leadowner",
            Collection::UserType => "usertype",
            Collection::IndustryType => "industrytype",
            Collection::Region => "region",
            Collection::Plan => "plan",
            Collection::PlanType => "plantype",
            Collection::Subscription => "subscription",
            Collection::Customer => "customer",
            Collection::EmailTemplate => "emailtemplate",
            Collection::Smtp => "smtp",
            Collection::General => "general",
            Collection::CompanySetting => "companysetting",
            Collection::CompanyFormatSetting => "companyformatsetting",
            Collection::CompanyWorkSetting => "companyworksetting",
            Collection::CompanyHoliday => "companyholiday",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plan type names. Trial plans go through `newSubscription`, paid plans
/// through `newCustomer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTypeName {
    Trial,
    Paid,
}

impl PlanTypeName {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanTypeName::Trial => "Trial",
            PlanTypeName::Paid => "Paid",
        }
    }
}

/// Roles seeded for every tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantRole {
    AccountOwner,
    SuperAdmin,
    UserAdmin,
    BillingAdmin,
    User,
}

impl TenantRole {
    pub const ALL: [TenantRole; 5] = [
        TenantRole::AccountOwner,
        TenantRole::SuperAdmin,
        TenantRole::UserAdmin,
        TenantRole::BillingAdmin,
        TenantRole::User,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TenantRole::AccountOwner => "Account Owner",
            TenantRole::SuperAdmin => "Super Admin",
            TenantRole::UserAdmin => "User Admin",
            TenantRole::BillingAdmin => "Billing Admin",
            TenantRole::User => "User",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }

    /// Roles allowed to sign in to the tenant console.
    pub fn can_sign_in_cap(self) -> bool {
        matches!(self, TenantRole::AccountOwner | TenantRole::SuperAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for c in Collection::ALL {
            assert_eq!(Collection::from_name(c.name()), Some(c));
        }
        assert_eq!(Collection::from_name("users"), None);
    }

    #[test]
    fn cap_roles() {
        assert!(TenantRole::AccountOwner.can_sign_in_cap());
        assert!(TenantRole::SuperAdmin.can_sign_in_cap());
        assert!(!TenantRole::BillingAdmin.can_sign_in_cap());
        assert_eq!(TenantRole::from_name("User Admin"), Some(TenantRole::UserAdmin));
    }
}
