use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{
            AssignCourierRequest, CourierSummary, DashboardStats, Delivery,
            InventoryAdjustRequest, LowStockQuery, UpdateOrderStatusRequest,
        },
        auth::{LoginRequest, LoginResponse, RegisterRequest, SessionInfo},
        cart::{AddToCartRequest, CartItemDto, CartList, CartSummary, UpdateCartItemRequest},
        categories::{CategoryList, CategoryView, CreateCategoryRequest, UpdateCategoryRequest},
        orders::{
            CheckoutRequest, CheckoutResponse, GuestCartLine, GuestDetails, OrderList,
            OrderWithItems,
        },
        payments::{InitializePaymentRequest, PaymentConfirmation},
        products::{CreateProductRequest, ProductDetail, ProductList, UpdateProductRequest},
        users::{UpdateRoleRequest, UserDetail, UserList, UserOrderStats},
        wishlist::{AddToWishlistRequest, MoveToCartRequest, WishlistEntry, WishlistList},
    },
    models::{
        CartItem, Category, Order, OrderItem, OrderStatus, OrderStatusEntry, PaymentMethod,
        Product, Role, User, WishlistItem,
    },
    payments::CheckoutSession,
    pricing::OrderQuote,
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, categories, courier, health, orders, params, payments,
        products as product_routes, wishlist,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("jf_session"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        product_routes::list_products,
        product_routes::get_product,
        product_routes::product_detail,
        product_routes::create_product,
        product_routes::update_product,
        product_routes::delete_product,
        categories::list_categories,
        categories::get_category,
        categories::get_category_by_slug,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        cart::cart_list,
        cart::cart_quote,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        wishlist::move_to_cart,
        orders::checkout,
        orders::list_orders,
        orders::track_order,
        orders::get_order,
        payments::initialize_payment,
        payments::payment_callback,
        payments::verify_payment,
        admin::dashboard,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::delete_order,
        admin::assign_courier,
        admin::list_couriers,
        admin::list_users,
        admin::get_user,
        admin::update_user_role,
        admin::delete_user,
        admin::list_low_stock,
        admin::adjust_inventory,
        courier::list_deliveries,
        courier::confirm_delivery
    ),
    components(
        schemas(
            Role,
            OrderStatus,
            PaymentMethod,
            User,
            Category,
            Product,
            CartItem,
            WishlistItem,
            Order,
            OrderItem,
            OrderStatusEntry,
            OrderQuote,
            CheckoutSession,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            SessionInfo,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            ProductDetail,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryView,
            CategoryList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemDto,
            CartSummary,
            CartList,
            AddToWishlistRequest,
            MoveToCartRequest,
            WishlistEntry,
            WishlistList,
            GuestDetails,
            GuestCartLine,
            CheckoutRequest,
            CheckoutResponse,
            OrderWithItems,
            OrderList,
            InitializePaymentRequest,
            PaymentConfirmation,
            UpdateOrderStatusRequest,
            AssignCourierRequest,
            LowStockQuery,
            InventoryAdjustRequest,
            CourierSummary,
            DashboardStats,
            Delivery,
            UpdateRoleRequest,
            UserOrderStats,
            UserDetail,
            UserList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::CategoryQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and session"),
        (name = "Products", description = "Product catalog"),
        (name = "Categories", description = "Category tree"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Payments", description = "Chapa payment flow"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Courier", description = "Courier delivery endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
